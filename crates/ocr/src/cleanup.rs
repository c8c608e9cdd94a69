// A lone y/Y (not part of a Latin word) before a digit is a misread ¥.
re!(re_latin_yen, r"(^|[^A-Za-z0-9_])[yY][^\S\r\n]*([0-9])");
re!(re_yuan_sign, r"元[^\S\r\n]*([0-9])");

/// Repair common OCR artifacts in recognized text. Line breaks are preserved
/// and the function is idempotent.
pub fn cleanup(raw: &str) -> String {
    let joined = join_cjk_runs(raw);
    let fixed = re_latin_yen().replace_all(&joined, "${1}¥${2}");
    re_yuan_sign().replace_all(&fixed, "¥${1}").into_owned()
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

fn is_inline_space(c: char) -> bool {
    c.is_whitespace() && c != '\n' && c != '\r'
}

/// Drop runs of in-line whitespace that sit between two CJK characters.
fn join_cjk_runs(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !is_inline_space(c) {
            out.push(c);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_inline_space(chars[i]) {
            i += 1;
        }
        let before = start.checked_sub(1).map(|j| chars[j]);
        let after = chars.get(i).copied();
        let between_cjk = before.is_some_and(is_cjk) && after.is_some_and(is_cjk);
        if !between_cjk {
            out.extend(&chars[start..i]);
        }
    }
    out
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_cleanup_is_idempotent(s in "[实付款元合计 yY¥0-9a-z.\t\r\n]{0,24}") {
            let once = cleanup(&s);
            prop_assert_eq!(cleanup(&once), once);
        }

        #[test]
        fn prop_cleanup_keeps_line_count(s in "[安踏 yY元0-9\n]{0,24}") {
            prop_assert_eq!(cleanup(&s).matches('\n').count(), s.matches('\n').count());
        }

        #[test]
        fn prop_cleanup_is_idempotent_on_any_string(s in any::<String>()) {
            let once = cleanup(&s);
            prop_assert_eq!(cleanup(&once), once);
        }
    }
}
