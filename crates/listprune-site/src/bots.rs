//! `{{bots}}` / `{{nobots}}` opt-out checking
//!
//! Pages can exclude bots wholesale or by name. Checked before every
//! notification edit; never checked for the managed lists themselves, which
//! opted in by carrying the configuration template.

/// Whether `bot` may edit a page with this content.
pub fn bot_allowed(content: &str, bot: &str) -> bool {
    if content.contains("{{nobots}}") {
        return false;
    }

    let Some(start) = content.find("{{bots") else {
        return true;
    };
    let rest = &content[start + "{{bots".len()..];
    let Some(end) = rest.find("}}") else {
        return true;
    };

    for piece in rest[..end].split('|') {
        if let Some((key, value)) = piece.split_once('=') {
            let names: Vec<&str> = value.split(',').map(str::trim).collect();
            match key.trim() {
                "allow" => return names.iter().any(|n| *n == bot || *n == "all"),
                "deny" => return !names.iter().any(|n| *n == bot || *n == "all"),
                _ => {}
            }
        }
    }

    true
}
