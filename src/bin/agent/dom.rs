use anyhow::{Result, bail};
use headless_chrome::Tab;
use std::sync::Arc;

/// Attribute carrying an element's on-screen label.
pub const LABEL_ATTR: &str = "data-rpa-label";

/// JavaScript injected before every screenshot to draw the yellow labels the
/// model clicks by.
///
/// The script:
///   1. Removes the overlay and labels left by the previous pass.
///   2. Walks interactive elements that are visible inside the viewport.
///   3. Gives each a two-letter label (AA, AB, ... ZZ) via `data-rpa-label`.
///   4. Draws a yellow box with the label at the element's top-left corner,
///      in a layer that ignores pointer events.
///   5. Returns the number of labelled elements.
const LABEL_JS: &str = r#"
(() => {
  document.querySelectorAll('[data-rpa-overlay]').forEach(n => n.remove());
  document.querySelectorAll('[data-rpa-label]').forEach(n => n.removeAttribute('data-rpa-label'));

  const SELECTOR = 'a, button, input, textarea, select, summary, [role="button"], [role="link"], '
    + '[role="menuitem"], [role="tab"], [role="treeitem"], [onclick]';
  const LETTERS = 'ABCDEFGHIJKLMNOPQRSTUVWXYZ';
  const layer = document.createElement('div');
  layer.setAttribute('data-rpa-overlay', '');
  layer.style.cssText = 'position:absolute;top:0;left:0;pointer-events:none;z-index:2147483647;';

  let id = 0;
  for (const el of document.querySelectorAll(SELECTOR)) {
    if (id >= LETTERS.length * LETTERS.length) break;
    const r = el.getBoundingClientRect();
    if (r.width < 2 || r.height < 2) continue;
    if (r.bottom < 0 || r.right < 0 || r.top > innerHeight || r.left > innerWidth) continue;
    const s = getComputedStyle(el);
    if (s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0') continue;

    const label = LETTERS[Math.floor(id / 26)] + LETTERS[id % 26];
    id++;
    el.setAttribute('data-rpa-label', label);

    const tag = document.createElement('div');
    tag.textContent = label;
    tag.style.cssText = 'position:absolute;background:#ffeb3b;color:#000;border:1px solid #000;'
      + 'font:bold 11px monospace;line-height:12px;padding:0 2px;';
    tag.style.left = (r.left + scrollX) + 'px';
    tag.style.top = (r.top + scrollY) + 'px';
    layer.appendChild(tag);
  }

  document.body.appendChild(layer);
  return id;
})()
"#;

/// Label the visible interactive elements. Returns how many were labelled.
pub fn label_elements(tab: &Arc<Tab>) -> Result<u64> {
    let result = tab.evaluate(LABEL_JS, false)?;
    Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
}

/// CSS selector for the element carrying `label`.
pub fn label_selector(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("'{}' is not an on-screen label", label);
    }
    Ok(format!("[{}=\"{}\"]", LABEL_ATTR, label.to_ascii_uppercase()))
}

/// Get the current page URL.
pub fn get_current_url(tab: &Arc<Tab>) -> Result<String> {
    let result = tab.evaluate("window.location.href", false)?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "unknown".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_targets_label_attribute() {
        assert_eq!(label_selector("DA").unwrap(), "[data-rpa-label=\"DA\"]");
        assert_eq!(label_selector(" ab ").unwrap(), "[data-rpa-label=\"AB\"]");
    }

    #[test]
    fn selector_rejects_non_labels() {
        assert!(label_selector("").is_err());
        assert!(label_selector("Log in").is_err());
        assert!(label_selector("\"];alert(1)").is_err());
    }
}
