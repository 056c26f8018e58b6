// Auto-print bootstrap injected into every job document.

/// Fires `window.print()` once the document is ready, with fallbacks because
/// the renderer's load timing cannot be observed from outside, then tries to
/// close the window after printing or after a hard 30 s limit.
const AUTO_PRINT_SCRIPT: &str = r#"
<script>
(() => {
  let didPrint = false;
  const triggerPrint = () => {
    if (didPrint) return;
    didPrint = true;
    try { window.focus(); } catch (_) {}
    try { window.print(); } catch (_) {}
  };
  const schedulePrint = (delayMs) => setTimeout(triggerPrint, delayMs);
  if (document.readyState === 'interactive' || document.readyState === 'complete') {
    schedulePrint(100);
  } else {
    document.addEventListener('DOMContentLoaded', () => schedulePrint(100), { once: true });
  }
  window.addEventListener('load', () => schedulePrint(120), { once: true });
  schedulePrint(1500);
  const safeClose = () => {
    try { window.close(); } catch (_) {}
    try { window.open('', '_self'); window.close(); } catch (_) {}
  };
  window.addEventListener('afterprint', () => setTimeout(safeClose, 200), { once: true });
  setTimeout(safeClose, 30000);
})();
</script>
"#;

/// Insert the bootstrap right before the first `</body>` (any case), or
/// append it when the document has no body close tag.
pub fn inject_auto_print(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + AUTO_PRINT_SCRIPT.len());
    match find_ascii_ci(html, "</body>") {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(AUTO_PRINT_SCRIPT);
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push_str(AUTO_PRINT_SCRIPT);
        }
    }
    out
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
