//! Heuristic detection of JavaScript-rendered pages
//!
//! Given content the static fetcher already obtained, the detector scores
//! how likely the page is to need a browser render. It never fetches
//! anything; it only analyses what it is handed.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Client-side frameworks the detector can fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Vue,
    Angular,
    Nextjs,
    Nuxt,
    None,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::React => "react",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::Nextjs => "nextjs",
            Self::Nuxt => "nuxt",
            Self::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// Raw numbers the verdict was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMetrics {
    pub link_count: usize,
    pub script_count: usize,
    pub text_length: usize,
    /// Scripts per kilobyte of visible text
    pub script_to_content_ratio: f64,
}

/// The detector's decision for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionVerdict {
    pub needs_dynamic: bool,
    /// Additive heuristic score, clamped to [0, 1]
    pub confidence: f64,
    /// Every contributing signal, "; "-joined
    pub reason: String,
    pub framework: Framework,
    pub metrics: DetectionMetrics,
}

/// Signal weights (additive, clamped to 1.0)
const WEIGHT_FRAMEWORK: f64 = 0.4;
const WEIGHT_FEW_LINKS: f64 = 0.3;
const WEIGHT_SCRIPT_RATIO: f64 = 0.2;
const WEIGHT_SCRIPT_HEAVY: f64 = 0.2;
const WEIGHT_LITTLE_TEXT: f64 = 0.1;

/// Scores a page's need for a browser render
///
/// # Signals
///
/// | Signal | Weight |
/// |---|---|
/// | Framework fingerprint matched | +0.4 |
/// | Fewer than 5 links | +0.3 |
/// | More than 5 scripts per KB of visible text | +0.2 |
/// | More than 10 scripts and under 1000 chars of text | +0.2 |
/// | Under 500 chars of visible text | +0.1 |
///
/// `needs_dynamic` is true when the clamped score exceeds 0.5. The caller
/// applies its own threshold on `confidence` before acting.
///
/// # Arguments
///
/// * `html` - The markup the static fetch produced
/// * `link_count` - Number of sanitized links extracted from it
/// * `script_count` - Number of script tags in the document
/// * `text_length` - Visible text length in characters
pub fn detect(
    html: &str,
    link_count: usize,
    script_count: usize,
    text_length: usize,
) -> DetectionVerdict {
    let mut confidence = 0.0;
    let mut reasons: Vec<String> = Vec::new();

    let framework = match_framework(html);
    if framework != Framework::None {
        confidence += WEIGHT_FRAMEWORK;
        reasons.push(format!("framework fingerprint: {}", framework));
    }

    if link_count < 5 {
        confidence += WEIGHT_FEW_LINKS;
        reasons.push(format!("only {} links found", link_count));
    }

    let script_to_content_ratio = if text_length > 0 {
        script_count as f64 / (text_length as f64 / 1000.0)
    } else if script_count > 0 {
        f64::INFINITY
    } else {
        0.0
    };
    if script_to_content_ratio > 5.0 {
        confidence += WEIGHT_SCRIPT_RATIO;
        reasons.push("high script-to-content ratio".to_string());
    }

    if script_count > 10 && text_length < 1000 {
        confidence += WEIGHT_SCRIPT_HEAVY;
        reasons.push(format!(
            "{} scripts with only {} chars of text",
            script_count, text_length
        ));
    }

    if text_length < 500 {
        confidence += WEIGHT_LITTLE_TEXT;
        reasons.push(format!("little visible text ({} chars)", text_length));
    }

    let confidence = confidence.min(1.0);
    let reason = if reasons.is_empty() {
        "no dynamic-rendering signals".to_string()
    } else {
        reasons.join("; ")
    };

    DetectionVerdict {
        needs_dynamic: confidence > 0.5,
        confidence,
        reason,
        framework,
        metrics: DetectionMetrics {
            link_count,
            script_count,
            text_length,
            script_to_content_ratio,
        },
    }
}

/// Matches framework fingerprints against the markup
///
/// Checked most-specific first (a Next.js page also carries React
/// markers); the first match wins.
fn match_framework(html: &str) -> Framework {
    let fingerprints: [(Framework, &str); 5] = [
        (Framework::Nextjs, r#"__NEXT_DATA__|/_next/|content="Next\.js"#),
        (Framework::Nuxt, r#"__NUXT__|/_nuxt/|content="Nuxt"#),
        (
            Framework::React,
            r"data-reactroot|data-reactid|react-dom[^\s>]*\.js",
        ),
        (
            Framework::Vue,
            r"data-v-[0-9a-f]{8}|__vue_app__|\bvue[^\s>]*\.js",
        ),
        (Framework::Angular, r"ng-version=|ng-app\b|angular[^\s>]*\.js"),
    ];

    for (framework, pattern) in fingerprints {
        if let Ok(regex) = Regex::new(pattern) {
            if regex.is_match(html) {
                return framework;
            }
        }
    }

    Framework::None
}
