use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::TargetError;

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(r?[^\]]*)\]").expect("template regex"))
}

fn numeric_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+-\d+)\]").expect("numeric range regex"))
}

/// Expands the bracket template language inside a target URL.
///
/// `[min-max]` produces one URL per value; several ranges multiply out.
/// `[rLEN;a-z_0-9]` substitutes a LEN-character random string drawn from the
/// underscore-separated character ranges, and needs a count — either numeric
/// ranges elsewhere in the URL or an explicit ` count` suffix after the URL.
/// A URL without brackets passes through untouched.
pub(crate) fn expand_url(raw: &str) -> Result<Vec<String>, TargetError> {
    let url = match raw.split_once(' ') {
        Some((head, _)) => head.to_string(),
        None => raw.to_string(),
    };

    let segments: Vec<(String, String)> = template_re()
        .captures_iter(&url)
        .map(|caps| (caps[0].to_string(), caps[1].to_string()))
        .collect();
    if segments.is_empty() {
        return Ok(vec![url]);
    }

    let count = template_count(raw)?;
    let mut expanded: Option<Vec<String>> = None;

    for (full, inner) in &segments {
        if let Some(spec) = inner.strip_prefix('r') {
            let (len_raw, ranges_raw) = spec
                .split_once(';')
                .ok_or_else(|| template_error(raw, "random segment needs `[rLEN;ranges]`"))?;
            let len: usize = len_raw
                .parse()
                .map_err(|_| template_error(raw, "random segment length is not an integer"))?;
            if count == 0 {
                return Err(template_error(raw, "random segment needs an explicit count"));
            }

            let mut alphabet: Vec<char> = Vec::new();
            for range in ranges_raw.split('_') {
                let (lo, hi) = char_range(range)
                    .ok_or_else(|| template_error(raw, "invalid character range"))?;
                alphabet.extend(lo..=hi);
            }
            if alphabet.is_empty() {
                return Err(template_error(raw, "empty character range"));
            }

            let urls = expanded.get_or_insert_with(|| vec![url.clone(); count]);
            let mut rng = rand::rng();
            for entry in urls.iter_mut() {
                let random: String = (0..len)
                    .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                    .collect();
                *entry = entry.replace(full.as_str(), &random);
            }
        } else {
            let (lo, _) = min_max(inner)
                .ok_or_else(|| template_error(raw, "range is not `min-max`"))?;
            let urls = expanded.get_or_insert_with(|| vec![url.clone(); count]);
            for (i, entry) in urls.iter_mut().enumerate() {
                *entry = entry.replace(full.as_str(), &(lo + i as i64).to_string());
            }
        }
    }

    Ok(expanded.unwrap_or_else(|| vec![url]))
}

/// How many URLs a template produces: the product of its numeric ranges, or
/// an explicit ` count` suffix when there are none. Ranges trump the suffix.
fn template_count(raw: &str) -> Result<usize, TargetError> {
    let mut count: usize = 0;
    for caps in numeric_range_re().captures_iter(raw) {
        let (lo, hi) =
            min_max(&caps[1]).ok_or_else(|| template_error(raw, "range is not `min-max`"))?;
        let span = (hi - lo + 1) as usize;
        count = if count == 0 { span } else { count * span };
    }
    if count > 0 {
        return Ok(count);
    }

    match raw.split_once(' ') {
        Some((_, suffix)) => suffix
            .trim()
            .parse()
            .map_err(|_| template_error(raw, "count is not an integer")),
        None => Err(template_error(raw, "random segment needs an explicit count")),
    }
}

fn min_max(spec: &str) -> Option<(i64, i64)> {
    let (lo, hi) = spec.split_once('-')?;
    let lo: i64 = lo.parse().ok()?;
    let hi: i64 = hi.parse().ok()?;
    (lo <= hi).then_some((lo, hi))
}

fn char_range(spec: &str) -> Option<(char, char)> {
    let (lo, hi) = spec.split_once('-')?;
    let (lo, hi) = (single_char(lo)?, single_char(hi)?);
    (lo <= hi).then_some((lo, hi))
}

fn single_char(spec: &str) -> Option<char> {
    let mut chars = spec.chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

fn template_error(url: &str, message: &str) -> TargetError {
    TargetError::Template {
        url: url.to_string(),
        message: message.to_string(),
    }
}
