//! Query-variant generation.
//!
//! Model filenames make poor search queries as-is: separators, version
//! suffixes, and precision markers all hurt recall. Each incoming query
//! expands into up to four alternate phrasings, ordered by specificity,
//! which the aggregator tries in turn.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum variants generated per query.
pub const MAX_VARIANTS: usize = 4;

/// Variants shorter than this are dropped.
const MIN_VARIANT_LEN: usize = 3;

/// Queries longer than this get a technical-suffix-stripped form.
const LONG_NAME_LEN: usize = 40;

/// Minimum length for a compacted variant to stay specific enough.
const MIN_COMPACT_LEN: usize = 10;

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(safetensors|ckpt|pt|pth|bin)$").expect("valid regex"));
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]+").expect("valid regex"));
static UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));
static TECH_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-_](pruned|ema|emaonly|fp16|fp32|inpainting|training|diffusers)[-_]?")
        .expect("valid regex")
});
static TOKEN_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\s]+").expect("valid regex"));
static VERSION_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v\d+").expect("valid regex"));
static VERSION_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v(\d+)-(\d+)").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Generate up to [`MAX_VARIANTS`] search phrasings for a query,
/// deduplicated case- and space-insensitively, most specific first.
pub fn generate_variants(query: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();

    let clean = EXTENSION_RE.replace(query, "").to_string();
    variants.push(clean.clone());

    // Separators to spaces: "Qwen_Rapid-v5.3" -> "Qwen Rapid v5.3".
    let spaced = SEPARATOR_RE.replace_all(&clean, " ").to_string();
    if spaced != clean {
        variants.push(spaced);
    }

    // Underscores to hyphens; some APIs index hyphenated names.
    let hyphened = UNDERSCORE_RE.replace_all(&clean, "-").to_string();
    if hyphened != clean && !variants.contains(&hyphened) {
        variants.push(hyphened);
    }

    // Long names lose their technical suffixes:
    // "model-v1.5-pruned-emaonly-fp16" -> "model-v1.5".
    if clean.chars().count() > LONG_NAME_LEN {
        let compact = TECH_SUFFIX_RE.replace_all(&clean, "-");
        let compact = SEPARATOR_RE
            .replace_all(&compact, "-")
            .trim_matches('-')
            .to_string();
        if compact != clean && compact.chars().count() >= MIN_COMPACT_LEN {
            variants.push(compact);
        }
    }

    // Names with several tokens reduce to the first few meaningful
    // ones, keeping version tokens like "v2".
    let parts: Vec<&str> = TOKEN_SPLIT_RE
        .split(&clean)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 3 {
        let meaningful: Vec<&str> = parts
            .iter()
            .copied()
            .filter(|p| p.chars().count() >= 3 || VERSION_TOKEN_RE.is_match(&p.to_lowercase()))
            .collect();
        if meaningful.len() >= 2 {
            let base = meaningful
                .iter()
                .take(3)
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if !variants.contains(&base) && base.chars().count() >= MIN_COMPACT_LEN {
                variants.push(base);
            }
        }
    }

    // "v1-5-pruned-emaonly" is an official Stable Diffusion release
    // naming scheme; map it to the phrase the hosting pages use.
    let normalized = clean.trim().to_lowercase();
    if let Some(caps) = VERSION_PREFIX_RE.captures(&normalized) {
        variants.push(format!("stable diffusion {}.{}", &caps[1], &caps[2]));
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for variant in variants {
        let variant = variant.trim().to_string();
        let key = WHITESPACE_RE
            .replace_all(&variant.to_lowercase(), " ")
            .to_string();
        if variant.chars().count() >= MIN_VARIANT_LEN && seen.insert(key) {
            unique.push(variant);
        }
    }
    unique.truncate(MAX_VARIANTS);
    unique
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_stripped_from_the_original() {
        let variants = generate_variants("flux1-dev.safetensors");
        assert_eq!(variants[0], "flux1-dev");
    }

    #[test]
    fn separators_expand_to_spaces_and_hyphens() {
        let variants = generate_variants("stable_diffusion_v1_5");
        assert!(variants.contains(&"stable diffusion v1 5".to_string()));
        assert!(variants.contains(&"stable-diffusion-v1-5".to_string()));
    }

    #[test]
    fn official_sd_name_maps_to_phrase() {
        let variants = generate_variants("v1-5-pruned-emaonly.safetensors");
        assert_eq!(variants[0], "v1-5-pruned-emaonly");
        assert!(variants.contains(&"stable diffusion 1.5".to_string()));
    }

    #[test]
    fn long_names_lose_technical_suffixes() {
        let variants =
            generate_variants("some-very-long-model-name-goes-here-v1-pruned-emaonly-fp16");
        assert!(variants
            .iter()
            .any(|v| !v.contains("pruned") && !v.contains("fp16") && v.contains("some-very-long")));
    }

    #[test]
    fn multi_token_names_get_a_compact_form() {
        let variants = generate_variants("Qwen_Rapid_AIO-NSFW-v5.3");
        assert!(variants.contains(&"Qwen Rapid AIO".to_string()));
    }

    #[test]
    fn at_most_four_variants() {
        let variants = generate_variants("Qwen_Rapid_AIO-NSFW-v5.3-extra_long_padding-fp16");
        assert!(variants.len() <= MAX_VARIANTS);
        assert!(!variants.is_empty());
    }

    #[test]
    fn duplicates_collapse_case_insensitively() {
        // Spaced and hyphened forms normalize apart but the original
        // equals the hyphened one, so only two variants remain.
        let variants = generate_variants("Flux-Dev");
        assert_eq!(variants, vec!["Flux-Dev".to_string(), "Flux Dev".to_string()]);
    }

    #[test]
    fn too_short_queries_yield_nothing() {
        assert!(generate_variants("ab").is_empty());
        assert!(generate_variants("").is_empty());
    }
}
