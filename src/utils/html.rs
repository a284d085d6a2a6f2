
/// Clean HTML content using the ammonia library.
///
/// Exam titles and descriptions are rendered by the web client, so they go
/// through a whitelist sanitizer: safe tags (like <b>, <p>) stay, dangerous
/// tags (like <script>, <iframe>) and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
