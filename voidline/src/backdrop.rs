//! Crossfade scheduling for the background slideshow.
//!
//! Images are shuffled once, then rotated every `interval`; each rotation is
//! a `transition`-long crossfade from `current` to `next`. Textures arrive
//! progressively, so rotation wraps over the images loaded so far. Rendering
//! is paused while the home view is hidden and resumed on the visibility
//! notification, with timers shifted by the time spent hidden.
use std::time::{Duration, Instant};

use rand::{seq::SliceRandom, Rng};
use voidline_config::config::{opt_f64, opt_u64, ConfigError};

pub const LANDSCAPE_IMAGES: &[&str] = &[
    "index/blue_butterfly.webp",
    "index/1 (1).webp",
    "index/1 (2).webp",
    "index/1 (3).webp",
    "index/1 (4).webp",
];

pub const PORTRAIT_IMAGES: &[&str] = &[
    "index/916/blue_butterfly.jpg",
    "index/916/1 (1).png",
    "index/916/1 (2).png",
    "index/916/1 (3).png",
    "index/916/1 (4).png",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BackdropOptions {
    pub interval: Duration,
    pub transition: Duration,
    /// Viewports at or below this width get the portrait set
    pub mobile_breakpoint: u32,
}

impl Default for BackdropOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            transition: Duration::from_millis(2500),
            mobile_breakpoint: 768,
        }
    }
}

impl BackdropOptions {
    /// Reads the `backdrop` section; durations are seconds.
    pub fn from_config(section: &serde_yaml::Value) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let seconds = |field: &str, default: Duration| -> Result<Duration, ConfigError> {
            match opt_f64(section, field)? {
                Some(s) if s.is_finite() && s > 0.0 => Ok(Duration::from_secs_f64(s)),
                Some(_) => Err(ConfigError::invalid(field, "must be positive")),
                None => Ok(default),
            }
        };
        let options = Self {
            interval: seconds("interval", defaults.interval)?,
            transition: seconds("transition", defaults.transition)?,
            mobile_breakpoint: opt_u64(section, "mobile_breakpoint")?
                .map(|w| u32::try_from(w).unwrap_or(u32::MAX))
                .unwrap_or(defaults.mobile_breakpoint),
        };
        Ok(options)
    }
}

/// Pick the image set for a viewport width.
pub fn image_set(viewport_width: u32, mobile_breakpoint: u32) -> &'static [&'static str] {
    if viewport_width <= mobile_breakpoint {
        PORTRAIT_IMAGES
    } else {
        LANDSCAPE_IMAGES
    }
}

/// What to draw this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub current: &'a str,
    pub next: &'a str,
    /// Crossfade position in `[0, 1)`, zero when idle
    pub progress: f32,
    /// Seconds since start, drives the ripple distortion
    pub effect: f32,
}

#[derive(Debug, Clone)]
pub struct Backdrop {
    images: Vec<String>,
    options: BackdropOptions,
    loaded: usize,
    current: usize,
    next: usize,
    started: Instant,
    last_rotation: Instant,
    transition_started: Option<Instant>,
    hidden_since: Option<Instant>,
}

impl Backdrop {
    pub fn new<R: Rng + ?Sized>(
        images: impl IntoIterator<Item = impl Into<String>>,
        options: BackdropOptions,
        rng: &mut R,
        now: Instant,
    ) -> Self {
        let mut images: Vec<String> = images.into_iter().map(Into::into).collect();
        images.shuffle(rng);
        Self {
            images,
            options,
            loaded: 0,
            current: 0,
            next: 1,
            started: now,
            last_rotation: now,
            transition_started: None,
            hidden_since: None,
        }
    }

    /// Shuffled load order; textures should be loaded in this order.
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Record that the first `count` images have their textures ready.
    pub fn mark_loaded(&mut self, count: usize) {
        self.loaded = count.min(self.images.len()).max(self.loaded);
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition_started.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.hidden_since.is_some()
    }

    /// Visibility notification from the view layer.
    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        match (visible, self.hidden_since) {
            (false, None) => self.hidden_since = Some(now),
            (true, Some(since)) => {
                let hidden = now.saturating_duration_since(since);
                self.last_rotation += hidden;
                if let Some(started) = self.transition_started.as_mut() {
                    *started += hidden;
                }
                self.hidden_since = None;
            }
            _ => {}
        }
    }

    /// Start a crossfade unless one is running or nothing is loaded.
    pub fn advance(&mut self, now: Instant) -> bool {
        if self.transition_started.is_some() || self.loaded == 0 {
            return false;
        }
        self.next = (self.current + 1) % self.loaded;
        self.transition_started = Some(now);
        true
    }

    /// Advance timers; does nothing while paused.
    pub fn tick(&mut self, now: Instant) {
        if self.is_paused() {
            return;
        }
        if let Some(started) = self.transition_started {
            if now.saturating_duration_since(started) >= self.options.transition {
                self.current = self.next;
                self.transition_started = None;
            }
        }
        while now.saturating_duration_since(self.last_rotation) >= self.options.interval {
            self.last_rotation += self.options.interval;
            self.advance(self.last_rotation);
            // a transition shorter than the interval finishes before the next rotation
            if let Some(started) = self.transition_started {
                if now.saturating_duration_since(started) >= self.options.transition {
                    self.current = self.next;
                    self.transition_started = None;
                }
            }
        }
    }

    pub fn progress(&self, now: Instant) -> f32 {
        match self.transition_started {
            Some(started) => {
                let p = now.saturating_duration_since(started).as_secs_f32()
                    / self.options.transition.as_secs_f32();
                p.min(0.999)
            }
            None => 0.0,
        }
    }

    /// Frame to render, `None` while paused or before the first texture.
    pub fn frame(&mut self, now: Instant) -> Option<Frame<'_>> {
        self.tick(now);
        if self.is_paused() || self.loaded == 0 {
            return None;
        }
        let next = if self.is_transitioning() {
            self.next
        } else {
            self.next.min(self.loaded - 1)
        };
        Some(Frame {
            current: &self.images[self.current],
            next: &self.images[next],
            progress: self.progress(now),
            effect: now.saturating_duration_since(self.started).as_secs_f32(),
        })
    }
}
