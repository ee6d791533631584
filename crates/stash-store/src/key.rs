//! Composite key codecs.
//!
//! Backends that address records by a single string key fold `(id, type)`
//! into one name with a fixed separator. Round-tripping is guaranteed only
//! when neither part contains [`SEPARATOR`].

/// Literal placed between the id and the type.
pub const SEPARATOR: &str = "-|-";

/// Extension given to object names whose id has none.
pub const DEFAULT_EXTENSION: &str = ".bin";

/// `id-|-type`
pub fn encode(id: &str, record_type: &str) -> String {
    format!("{id}{SEPARATOR}{record_type}")
}

/// Split a key on the first separator. Returns empty strings when there is
/// no separator.
pub fn decode(key: &str) -> (String, String) {
    match key.split_once(SEPARATOR) {
        Some((id, record_type)) => (id.to_owned(), record_type.to_owned()),
        None => (String::new(), String::new()),
    }
}

/// The extension of the final `/` segment of `name`, including the dot.
///
/// Returns `""` when the final segment has no dot.
pub fn extension(name: &str) -> &str {
    let segment_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[segment_start..].rfind('.') {
        Some(dot) => &name[segment_start + dot..],
        None => "",
    }
}

/// Object-store variant: the id's extension moves behind the type so the
/// object name keeps a meaningful suffix.
///
/// `photo.png` + `image` becomes `photo-|-image.png`; `a1` + `t` becomes
/// `a1-|-t.bin`.
pub fn encode_object_name(id: &str, record_type: &str) -> String {
    let ext = extension(id);
    let stem = &id[..id.len() - ext.len()];
    let ext = if ext.is_empty() { DEFAULT_EXTENSION } else { ext };
    format!("{stem}{SEPARATOR}{record_type}{ext}")
}

/// Inverse of [`encode_object_name`].
///
/// The trailing extension is restored onto the id unless it is
/// [`DEFAULT_EXTENSION`], so an id that itself ends in `.bin` decodes without
/// it.
pub fn decode_object_name(name: &str) -> (String, String) {
    let ext = extension(name);
    let stem = &name[..name.len() - ext.len()];
    let Some((id, record_type)) = stem.split_once(SEPARATOR) else {
        return (String::new(), String::new());
    };

    if ext == DEFAULT_EXTENSION {
        (id.to_owned(), record_type.to_owned())
    } else {
        (format!("{id}{ext}"), record_type.to_owned())
    }
}
