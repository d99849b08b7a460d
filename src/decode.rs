//! Tolerant decoding of API records into [`Article`]s.
//!
//! The API is inconsistent about a few fields, most notably `tag_list`, which
//! arrives as an array on some endpoints and as a comma-separated string on
//! others. Required fields are strict: a missing or mistyped value is a
//! [`DecodeError`] naming the field, never a silent default. Optional fields
//! default to `None` when absent or null.
//!
//! Everything here is pure: no I/O, no logging, no shared state.

use serde_json::{Map, Value};

use crate::error::{DecodeError, Error, Result};
use crate::types::{Article, ArticleId, Author, AuthorKind};

type Object = Map<String, Value>;

/// One way of reading the `tag_list` field; `None` means "not this shape"
type TagShape = fn(&Value) -> Option<Vec<String>>;

/// Tag shapes, tried in order. Anything that matches none of them yields no tags.
const TAG_SHAPES: &[TagShape] = &[tags_from_array, tags_from_delimited_string];

/// Decode a single article record
///
/// # Errors
/// Returns a [`DecodeError`] identifying the first required field that is
/// missing or has the wrong type, or an optional field present with the wrong type.
pub fn decode_article(value: &Value) -> std::result::Result<Article, DecodeError> {
    let obj = value.as_object().ok_or_else(|| DecodeError::NotAnObject {
        context: "article".to_string(),
    })?;

    Ok(Article {
        id: ArticleId(required_i64(obj, "", "id")?),
        title: required_str(obj, "", "title")?,
        description: required_str(obj, "", "description")?,
        cover_image_url: optional_str(obj, "", "cover_image")?,
        published_at: required_str(obj, "", "published_at")?,
        display_date: required_str(obj, "", "readable_publish_date")?,
        author: required_author(obj, "user", AuthorKind::Person)?,
        organization: optional_author(obj, "organization", AuthorKind::Organization)?,
        canonical_url: required_str(obj, "", "url")?,
        tags: decode_tags(obj.get("tag_list")),
        reading_time_minutes: required_i64(obj, "", "reading_time_minutes")?,
        body_html: optional_str(obj, "", "body_html")?,
        body_markdown: optional_str(obj, "", "body_markdown")?,
    })
}

/// Decode a list response (a JSON array of article records)
///
/// The first failing record aborts the whole page; its position is reported
/// through [`DecodeError::InPage`].
pub fn decode_page(value: &Value) -> std::result::Result<Vec<Article>, DecodeError> {
    let records = value.as_array().ok_or(DecodeError::NotAnArray)?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            decode_article(record).map_err(|source| DecodeError::InPage {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Parse and decode a single-article response body
///
/// # Errors
/// - [`Error::NoData`] if the body is empty or whitespace
/// - [`Error::DecodeFailed`] if it is not JSON or violates the article contract
pub fn decode_article_bytes(body: &[u8]) -> Result<Article> {
    let value = parse_body(body)?;
    Ok(decode_article(&value)?)
}

/// Parse and decode a list response body
///
/// # Errors
/// Same as [`decode_article_bytes`], applied to every record.
pub fn decode_page_bytes(body: &[u8]) -> Result<Vec<Article>> {
    let value = parse_body(body)?;
    Ok(decode_page(&value)?)
}

fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::NoData);
    }
    serde_json::from_slice(body).map_err(|e| Error::DecodeFailed(e.into()))
}

/// Normalize a `tag_list` value
///
/// Shapes are tried in order: an array of strings, then a non-empty
/// comma-separated string. Absent, null, or any other shape yields an empty list.
/// Blank entries are never kept.
pub fn decode_tags(value: Option<&Value>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };

    TAG_SHAPES
        .iter()
        .find_map(|shape| shape(value))
        .unwrap_or_default()
}

/// Split a comma-separated tag string
///
/// Each piece is trimmed and order is preserved. An empty string gives no tags
/// rather than a single empty one.
pub fn split_tag_string(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn tags_from_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|tag| tag.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .map(|tags| {
            tags.into_iter()
                .filter(|tag| !tag.trim().is_empty())
                .collect()
        })
}

fn tags_from_delimited_string(value: &Value) -> Option<Vec<String>> {
    value
        .as_str()
        .filter(|raw| !raw.is_empty())
        .map(split_tag_string)
}

fn required_author(
    obj: &Object,
    field: &'static str,
    kind: AuthorKind,
) -> std::result::Result<Author, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field.to_string())),
        Some(value) => decode_author(value, field, kind),
    }
}

fn optional_author(
    obj: &Object,
    field: &'static str,
    kind: AuthorKind,
) -> std::result::Result<Option<Author>, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode_author(value, field, kind).map(Some),
    }
}

fn decode_author(
    value: &Value,
    field: &'static str,
    kind: AuthorKind,
) -> std::result::Result<Author, DecodeError> {
    let obj = value.as_object().ok_or_else(|| DecodeError::InvalidType {
        field: field.to_string(),
        expected: "object",
    })?;

    Ok(Author {
        kind,
        name: required_str(obj, field, "name")?,
        handle: required_str(obj, field, "username")?,
        avatar_url: optional_str(obj, field, "profile_image")?,
    })
}

fn field_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn required_str(
    obj: &Object,
    prefix: &str,
    field: &str,
) -> std::result::Result<String, DecodeError> {
    optional_str(obj, prefix, field)?
        .ok_or_else(|| DecodeError::MissingField(field_path(prefix, field)))
}

fn optional_str(
    obj: &Object,
    prefix: &str,
    field: &str,
) -> std::result::Result<Option<String>, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::InvalidType {
            field: field_path(prefix, field),
            expected: "string",
        }),
    }
}

fn required_i64(obj: &Object, prefix: &str, field: &str) -> std::result::Result<i64, DecodeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field_path(prefix, field))),
        Some(value) => value.as_i64().ok_or_else(|| DecodeError::InvalidType {
            field: field_path(prefix, field),
            expected: "integer",
        }),
    }
}
