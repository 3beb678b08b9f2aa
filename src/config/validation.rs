use crate::config::types::{Config, CrawlLimits, CrawlOptions};
use crate::ConfigError;

/// Hard ceiling on crawl depth
pub const MAX_DEPTH_CAP: u32 = 5;

/// Hard ceiling on pages per session
pub const MAX_PAGES_CAP: usize = 100;

/// Hard ceiling on followed links per page
pub const CHILD_LINKS_CAP: usize = 10;

/// Allowed range for the inter-fetch delay, in milliseconds
pub const DELAY_MS_RANGE: (u64, u64) = (500, 5000);

impl CrawlLimits {
    /// Returns a copy with every limit forced inside its documented cap
    ///
    /// The scheduler applies this at session start, so out-of-range values
    /// from any caller are clamped rather than rejected. Adjustments are
    /// logged at warn level.
    pub fn clamped(&self) -> Self {
        let mut limits = self.clone();

        if limits.max_depth > MAX_DEPTH_CAP {
            tracing::warn!(
                "max_depth {} exceeds cap, clamping to {}",
                limits.max_depth,
                MAX_DEPTH_CAP
            );
            limits.max_depth = MAX_DEPTH_CAP;
        }

        if limits.max_pages > MAX_PAGES_CAP {
            tracing::warn!(
                "max_pages {} exceeds cap, clamping to {}",
                limits.max_pages,
                MAX_PAGES_CAP
            );
            limits.max_pages = MAX_PAGES_CAP;
        }
        if limits.max_pages == 0 {
            limits.max_pages = 1;
        }

        if limits.child_links_per_page > CHILD_LINKS_CAP {
            tracing::warn!(
                "child_links_per_page {} exceeds cap, clamping to {}",
                limits.child_links_per_page,
                CHILD_LINKS_CAP
            );
            limits.child_links_per_page = CHILD_LINKS_CAP;
        }

        let (delay_min, delay_max) = DELAY_MS_RANGE;
        if limits.delay_ms < delay_min || limits.delay_ms > delay_max {
            let clamped = limits.delay_ms.clamp(delay_min, delay_max);
            tracing::warn!(
                "delay_ms {} outside {}..={}, clamping to {}",
                limits.delay_ms,
                delay_min,
                delay_max,
                clamped
            );
            limits.delay_ms = clamped;
        }

        limits
    }
}

/// Validates a loaded configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_options(&config.crawl)?;
    Ok(())
}

fn validate_options(options: &CrawlOptions) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&options.detection_threshold) {
        return Err(ConfigError::Validation(format!(
            "detection-threshold must be between 0.0 and 1.0, got {}",
            options.detection_threshold
        )));
    }

    if options.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than zero".to_string(),
        ));
    }

    if options.concurrency == 0 {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if options.screenshot && options.screenshot_dir.is_none() {
        return Err(ConfigError::Validation(
            "screenshot requires screenshot-dir to be set".to_string(),
        ));
    }

    Ok(())
}
