// Property file parser
// Parses the `key = value` lines of vinput.cfg

/// Parse property file text, invoking `handler` for each key-value pair.
///
/// Keys keep their case. `#` starts a comment, also after a value. Lines
/// without `=` are skipped with a warning; whitespace around keys and values
/// is trimmed.
pub fn parse_propfile(data: &str, handler: &mut dyn FnMut(&str, &str)) {
    for (lineno, raw) in data.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    log::warn!("vinput.cfg:{}: value without key", lineno + 1);
                    continue;
                }
                handler(key, value.trim());
            }
            None => log::warn!("vinput.cfg:{}: key without value", lineno + 1),
        }
    }
}

/// Collect all pairs in file order
pub fn collect_properties(data: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    parse_propfile(data, &mut |k, v| pairs.push((k.to_string(), v.to_string())));
    pairs
}
