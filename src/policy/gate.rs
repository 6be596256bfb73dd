//! Static screening of policy source text, applied before anything is
//! parsed.

const LOOP_WORDS: [&str; 3] = ["while", "for", "loop"];
const BLOCKING_WORDS: [&str; 2] = ["wait", "sleep"];
const LEDGER_BINDING: &str = "ledger";
const LEDGER_ACCESSOR_PREFIX: &str = "get_";

/// Returns the reason a script is refused, if it is.
pub fn screen(script: &str, max_len: usize) -> Result<(), String> {
    if script.len() > max_len {
        return Err(format!(
            "script is {} bytes long, the limit is {}",
            script.len(),
            max_len
        ));
    }

    for (end, word) in words(script) {
        if LOOP_WORDS.iter().any(|w| *w == word) {
            return Err(format!("loop keyword `{}`", word));
        }
        if BLOCKING_WORDS.iter().any(|w| *w == word) {
            return Err(format!("blocking keyword `{}`", word));
        }
        if word == LEDGER_BINDING && !is_ledger_accessor(&script[end..]) {
            return Err(format!(
                "`{}` may only be used as `{}.{}...`",
                LEDGER_BINDING, LEDGER_BINDING, LEDGER_ACCESSOR_PREFIX
            ));
        }
    }
    Ok(())
}

fn is_ledger_accessor(rest: &str) -> bool {
    rest.trim_start()
        .strip_prefix('.')
        .is_some_and(|member| member.trim_start().starts_with(LEDGER_ACCESSOR_PREFIX))
}

/// Every run of identifier characters, paired with its end offset.
/// String literals are not skipped.
fn words(script: &str) -> Vec<(usize, &str)> {
    let mut found = Vec::new();
    let mut start = None;
    for (i, c) in script.char_indices() {
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        match (is_word, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                found.push((i, &script[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        found.push((script.len(), &script[s..]));
    }
    found
}
