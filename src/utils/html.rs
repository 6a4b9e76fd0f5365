/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive while <script>,
/// <iframe> and event-handler attributes are stripped. Chat messages are
/// relayed verbatim to other clients, so they go through here first.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        assert_eq!(clean_html("<b>hi</b><script>alert(1)</script>"), "<b>hi</b>");
        assert_eq!(clean_html("plain text"), "plain text");
    }
}
