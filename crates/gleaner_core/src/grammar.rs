use url::Url;

/// Host/path prefix shared by every media URL on the instance.
pub const MEDIA_PATH_MARKER: &str = "media.misskeyusercontent.jp/io/";

/// Path segment prefix that marks a low-resolution preview rendition.
pub const THUMBNAIL_MARKER: &str = "thumbnail-";

/// Derivative renditions with this filename prefix are never stored.
const EXCLUDED_FILENAME_PREFIX: &str = "webpublic";

/// Extensions recognized when scanning existing output for dedup seeding.
const RECOGNIZED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const MAX_FILENAME_LEN: usize = 150;

/// True when `source` points at a preview rendition: the thumbnail marker
/// directly follows the media path prefix.
pub fn is_thumbnail_source(source: &str) -> bool {
    match source.find(MEDIA_PATH_MARKER) {
        Some(pos) => source[pos + MEDIA_PATH_MARKER.len()..].starts_with(THUMBNAIL_MARKER),
        None => false,
    }
}

/// True when `source` points at full-resolution bytes: it carries the
/// media path prefix and no thumbnail marker anywhere.
pub fn is_original_source(source: &str) -> bool {
    source.contains(MEDIA_PATH_MARKER) && !source.contains(THUMBNAIL_MARKER)
}

/// Prefix a default scheme onto scheme-less URLs.
pub fn ensure_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// True when `filename` names a low-value derivative rendition that is
/// excluded from storage.
pub fn is_excluded_filename(filename: &str) -> bool {
    filename.starts_with(EXCLUDED_FILENAME_PREFIX)
}

/// True when `filename` has one of the image extensions the store scans
/// for when seeding the dedup index.
pub fn is_recognized_image(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => RECOGNIZED_EXTENSIONS
            .iter()
            .any(|recognized| recognized.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Candidate storage filename for a media URL: the last path segment,
/// sanitized for the filesystem. `None` when the path has no usable
/// basename.
pub fn candidate_filename(url: &str) -> Option<String> {
    let absolute = ensure_scheme(url);
    let parsed = Url::parse(&absolute).ok()?;
    let basename = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    let cleaned = sanitize_filename(basename);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// `name.ext` -> `name_{counter}.ext`, used to step past path collisions.
pub fn suffixed_filename(filename: &str, counter: u32) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{counter}.{ext}"),
        _ => format!("{filename}_{counter}"),
    }
}

/// Windows-safe filename: forbidden characters replaced, underscore runs
/// collapsed, reserved device names defused.
fn sanitize_filename(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut final_name = compacted;
    if final_name.len() > MAX_FILENAME_LEN {
        let mut cut = MAX_FILENAME_LEN;
        while !final_name.is_char_boundary(cut) {
            cut -= 1;
        }
        final_name.truncate(cut);
    }
    let stem_reserved = {
        let stem = final_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&final_name);
        is_reserved_windows_name(stem)
    };
    if stem_reserved {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
