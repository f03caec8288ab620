//! URL-safe identifiers derived from human text.
//!
//! Every output filename, permalink and presenter cross-reference goes
//! through [`slugify`], so two records naming the same person always land on
//! the same slug:
//!
//! - `"Jane Doe"` → `jane-doe`
//! - `"José  García!"` → `jose-garcia`
//! - `"Rust <3 & WASM"` → `rust-3-wasm`

/// Map arbitrary text to a lowercase, hyphen-separated slug.
///
/// - Transliterates non-ASCII characters to their closest ASCII spelling
/// - Replaces everything except `a-z` and `0-9` with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
///
/// Returns an empty string when the input has no alphanumeric content.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    let mut prev_dash = true;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}
