//! JavaScript snippets evaluated in the page
//!
//! Every selector is embedded as a JSON string literal so quotes and
//! backslashes in selectors cannot break out of the expression.

use action_primitives::{PageCondition, SelectBy};
use serde_json::Value;

fn lit(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Shared helper defining `__probe(el)` inside each snippet
const PROBE_FN: &str = r#"const __probe = (el) => {
    if (!el) return { exists: false, enabled: false, rendered: false };
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const rendered = rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden' && style.display !== 'none';
    return { exists: true, enabled: !el.disabled, rendered };
};"#;

pub fn probe(selector: &str) -> String {
    format!(
        "(() => {{ {} return __probe(document.querySelector({})); }})()",
        PROBE_FN,
        lit(selector)
    )
}

pub fn candidates(container: &str, target: &str) -> String {
    format!(
        "(() => {{ {} const root = document.querySelector({}); \
         if (!root) return []; \
         return Array.from(root.querySelectorAll({})).map(__probe); }})()",
        PROBE_FN,
        lit(container),
        lit(target)
    )
}

pub fn click_nth(container: &str, target: &str, index: usize) -> String {
    format!(
        "(() => {{ const root = document.querySelector({}); \
         if (!root) return false; \
         const el = root.querySelectorAll({})[{}]; \
         if (!el) return false; \
         el.scrollIntoView({{ block: 'center' }}); el.click(); return true; }})()",
        lit(container),
        lit(target),
        index
    )
}

/// Returns false when the element is missing
pub fn fill(selector: &str, text: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return false; \
         el.focus(); el.value = {}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         el.blur(); return true; }})()",
        lit(selector),
        lit(text)
    )
}

/// Returns `"missing"`, `"no_option"` or `"ok"`
pub fn select_option(selector: &str, by: &SelectBy) -> String {
    let matcher = match by {
        SelectBy::Index(index) => format!("(opt, i) => i === {}", index),
        SelectBy::Value(value) => format!("(opt) => opt.value === {}", lit(value)),
        SelectBy::Label(label) => format!("(opt) => opt.text.trim() === {}", lit(label)),
    };
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return 'missing'; \
         const opts = Array.from(el.options || []); \
         const idx = opts.findIndex({}); \
         if (idx < 0) return 'no_option'; \
         el.selectedIndex = idx; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return 'ok'; }})()",
        lit(selector),
        matcher
    )
}

/// `null` when the element is missing
pub fn options(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return null; \
         return Array.from(el.options || []).map(o => ({{ value: o.value, text: o.text.trim() }})); }})()",
        lit(selector)
    )
}

/// Window given to the observer to deliver buffered paint entries
const LCP_SETTLE_MS: u64 = 100;

/// Promise of the latest `largest-contentful-paint` start time, rounded to
/// whole milliseconds; `null` when no entry was buffered
pub fn lcp() -> String {
    format!(
        "new Promise((resolve) => {{ let last = null; \
         try {{ \
           const obs = new PerformanceObserver((list) => {{ \
             const entries = list.getEntries(); \
             if (entries.length) last = entries[entries.length - 1].startTime; }}); \
           obs.observe({{ type: 'largest-contentful-paint', buffered: true }}); \
           setTimeout(() => {{ obs.disconnect(); \
             resolve(last === null ? null : Math.round(last)); }}, {}); \
         }} catch (e) {{ resolve(null); }} }})",
        LCP_SETTLE_MS
    )
}

pub fn ready_state() -> &'static str {
    "document.readyState"
}

/// Boolean expression for conditions that can be decided in the DOM
///
/// URL conditions are answered from the DevTools URL instead.
pub fn condition(condition: &PageCondition) -> Option<String> {
    match condition {
        PageCondition::UrlContains(_) | PageCondition::UrlIs(_) => None,
        PageCondition::HasValue { selector } => Some(format!(
            "(() => {{ const el = document.querySelector({}); return !!(el && el.value); }})()",
            lit(selector)
        )),
        PageCondition::OptionsLoaded {
            selector,
            min_options,
        } => Some(format!(
            "(() => {{ const el = document.querySelector({}); \
             return !!(el && !el.disabled && el.options && el.options.length > {}); }})()",
            lit(selector),
            min_options
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted() {
        let script = probe(r#"input[name="rut"]"#);
        assert!(script.contains(r#"document.querySelector("input[name=\"rut\"]")"#));
    }

    #[test]
    fn select_by_value_matches_value() {
        let script = select_option("#county", &SelectBy::Value("13101".into()));
        assert!(script.contains(r#"opt.value === "13101""#));
    }

    #[test]
    fn select_by_index_uses_position() {
        let script = select_option("#store", &SelectBy::Index(1));
        assert!(script.contains("i === 1"));
    }

    #[test]
    fn lcp_reads_buffered_entries() {
        let script = lcp();
        assert!(script.contains("type: 'largest-contentful-paint', buffered: true"));
        assert!(script.contains("Math.round(last)"));
        assert!(script.contains("resolve(null)"));
    }

    #[test]
    fn url_condition_is_not_a_script() {
        assert!(condition(&PageCondition::UrlContains("/products/".into())).is_none());
        assert!(condition(&PageCondition::UrlIs("https://shop.test/".into())).is_none());
        let loaded = condition(&PageCondition::OptionsLoaded {
            selector: "#county".into(),
            min_options: 1,
        })
        .unwrap();
        assert!(loaded.contains("el.options.length > 1"));
    }
}
