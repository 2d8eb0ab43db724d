/// URL-safe identifier for a meal title.
///
/// Lowercases the title, collapses every run of non-alphanumeric characters
/// into one `-`, and trims leading/trailing separators. Unicode letters are
/// kept as they are (no ASCII folding), so `Crème Brûlée` becomes
/// `crème-brûlée`. May return an empty string for titles with no
/// alphanumeric content; the caller decides what that means.
pub fn derive_identifier(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for ch in title.chars() {
        if !ch.is_alphanumeric() {
            pending_sep = true;
            continue;
        }
        // lowercasing can expand into combining marks (`İ` -> `i\u{307}`); keep
        // only the alphanumeric part so the output is a fixed point
        for lower in ch.to_lowercase().filter(|c| c.is_alphanumeric()) {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(lower);
        }
    }

    slug
}

/// Object-store key `<identifier>.<extension>`, with the extension taken
/// verbatim from the last dot-segment of the uploaded file name.
pub fn object_key(identifier: &str, file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!("{identifier}.{ext}"))
}
