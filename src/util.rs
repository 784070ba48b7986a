//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model payloads. Cuts on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{n} of {n} ({style})", &[("n", "3"), ("style", "quiz")]);
    assert_eq!(out, "3 of 3 (quiz)");
  }

  #[test]
  fn fill_template_leaves_unknown_keys() {
    assert_eq!(fill_template("{missing}", &[("n", "1")]), "{missing}");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    let s = "ééééé";
    let out = trunc_for_log(s, 3);
    assert!(out.starts_with('é'));
    assert!(out.ends_with("(10 bytes total)"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
