//! Book model, request payloads and list filter

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, AppResult};

/// Book record, keyed by ISBN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub isbn: String,
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i32,
    pub publisher: String,
    pub title: String,
    pub year: i32,
}

/// Create book request.
///
/// Every field is required. Fields are optional here so that missing fields
/// are reported together with the other violations.
#[derive(Debug, Default, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub isbn: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub amazon_url: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub author: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub language: Option<String>,
    #[validate(
        required(message = "is required"),
        range(min = 0, message = "must be greater than or equal to 0")
    )]
    pub pages: Option<i32>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub publisher: Option<String>,
    #[validate(
        required(message = "is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub title: Option<String>,
    #[validate(required(message = "is required"))]
    pub year: Option<i32>,
}

impl CreateBook {
    /// Read a JSON body and validate it into the book to insert.
    ///
    /// Type errors, missing fields and empty values are all reported at once.
    pub fn parse(body: &Value) -> AppResult<Book> {
        let mut reader = FieldReader::new(body)?;
        let payload = CreateBook {
            isbn: reader.string("isbn"),
            amazon_url: reader.string("amazon_url"),
            author: reader.string("author"),
            language: reader.string("language"),
            pages: reader.integer("pages"),
            publisher: reader.string("publisher"),
            title: reader.string("title"),
            year: reader.integer("year"),
        };
        reader.finish(payload.validate())?;
        payload.into_book()
    }

    /// Validate the payload and turn it into the book to insert
    pub fn into_book(self) -> AppResult<Book> {
        self.validate()
            .map_err(|errors| AppError::Validation(validation_messages(&errors)))?;

        let incomplete = || AppError::Internal("validated book payload is incomplete".to_string());

        Ok(Book {
            isbn: self.isbn.ok_or_else(incomplete)?,
            amazon_url: self.amazon_url.ok_or_else(incomplete)?,
            author: self.author.ok_or_else(incomplete)?,
            language: self.language.ok_or_else(incomplete)?,
            pages: self.pages.ok_or_else(incomplete)?,
            publisher: self.publisher.ok_or_else(incomplete)?,
            title: self.title.ok_or_else(incomplete)?,
            year: self.year.ok_or_else(incomplete)?,
        })
    }
}

/// Update book request. Any subset of fields may be supplied; `isbn` may not.
#[derive(Debug, Default, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub amazon_url: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub author: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub language: Option<String>,
    #[validate(range(min = 0, message = "must be greater than or equal to 0"))]
    pub pages: Option<i32>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub publisher: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub title: Option<String>,
    pub year: Option<i32>,
}

impl UpdateBook {
    /// Read a JSON body, checking every supplied field
    pub fn parse(body: &Value) -> AppResult<UpdateBook> {
        let mut reader = FieldReader::new(body)?;
        if reader.contains("isbn") {
            reader.reject("isbn", "cannot be changed");
        }
        let payload = UpdateBook {
            amazon_url: reader.string("amazon_url"),
            author: reader.string("author"),
            language: reader.string("language"),
            pages: reader.integer("pages"),
            publisher: reader.string("publisher"),
            title: reader.string("title"),
            year: reader.integer("year"),
        };
        reader.finish(payload.validate())?;
        Ok(payload)
    }

    /// True when no column would change
    pub fn is_empty(&self) -> bool {
        self.amazon_url.is_none()
            && self.author.is_none()
            && self.language.is_none()
            && self.pages.is_none()
            && self.publisher.is_none()
            && self.title.is_none()
            && self.year.is_none()
    }
}

/// Typed access to the fields of a JSON object body.
///
/// A field with the wrong JSON type (including `null`) reads as absent and
/// records a violation; validator rules then skip that field.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    rejected: Vec<&'static str>,
    messages: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(body: &'a Value) -> AppResult<Self> {
        match body.as_object() {
            Some(object) => Ok(Self {
                object,
                rejected: Vec::new(),
                messages: Vec::new(),
            }),
            None => Err(AppError::Validation(vec![
                "body: must be a JSON object".to_string(),
            ])),
        }
    }

    fn contains(&self, field: &str) -> bool {
        self.object.contains_key(field)
    }

    fn reject(&mut self, field: &'static str, message: &str) {
        self.rejected.push(field);
        self.messages.push(format!("{}: {}", field, message));
    }

    fn string(&mut self, field: &'static str) -> Option<String> {
        match self.object.get(field)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.reject(field, "must be a string");
                None
            }
        }
    }

    fn integer(&mut self, field: &'static str) -> Option<i32> {
        let value = self.object.get(field)?;
        match value.as_i64().and_then(|n| i32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.reject(field, "must be an integer");
                None
            }
        }
    }

    /// Merge type violations with validator results
    fn finish(mut self, validated: Result<(), ValidationErrors>) -> AppResult<()> {
        if let Err(errors) = validated {
            let rejected = &self.rejected;
            self.messages.extend(
                validation_messages(&errors)
                    .into_iter()
                    .filter(|m| !rejected.iter().any(|f| m.starts_with(&format!("{}: ", f)))),
            );
        }

        if self.messages.is_empty() {
            Ok(())
        } else {
            self.messages.sort();
            Err(AppError::Validation(self.messages))
        }
    }
}

/// Flatten validator errors into sorted `field: message` strings
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| match &err.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, err.code),
            })
        })
        .collect();
    messages.sort();
    messages
}

/// Columns of the `books` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookColumn {
    Isbn,
    AmazonUrl,
    Author,
    Language,
    Pages,
    Publisher,
    Title,
    Year,
}

impl BookColumn {
    pub const ALL: [BookColumn; 8] = [
        BookColumn::Isbn,
        BookColumn::AmazonUrl,
        BookColumn::Author,
        BookColumn::Language,
        BookColumn::Pages,
        BookColumn::Publisher,
        BookColumn::Title,
        BookColumn::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookColumn::Isbn => "isbn",
            BookColumn::AmazonUrl => "amazon_url",
            BookColumn::Author => "author",
            BookColumn::Language => "language",
            BookColumn::Pages => "pages",
            BookColumn::Publisher => "publisher",
            BookColumn::Title => "title",
            BookColumn::Year => "year",
        }
    }
}

/// Query parameters accepted when listing books.
///
/// Each supplied parameter becomes an equality filter on its column, compared
/// against the text form of the column, so `?pages=100` needs no parsing. A
/// repeated parameter matches any of its values. Unknown parameters are ignored.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub isbn: Option<String>,
    pub amazon_url: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
}

/// Filters for listing books, in table column order.
/// A book matches when every column equals one of that column's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub conditions: Vec<(BookColumn, Vec<String>)>,
}

impl BookFilter {
    /// Build from raw query pairs, keeping repeated keys
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let conditions = BookColumn::ALL
            .iter()
            .filter_map(|column| {
                let values: Vec<String> = pairs
                    .iter()
                    .filter(|(key, _)| key == column.as_str())
                    .map(|(_, value)| value.clone())
                    .collect();
                (!values.is_empty()).then_some((*column, values))
            })
            .collect();
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_body() -> Value {
        json!({
            "isbn": "0987654321",
            "amazon_url": "http://a.co/newbook",
            "author": "New Author",
            "language": "Spanish",
            "pages": 200,
            "publisher": "New Publisher",
            "title": "New Book",
            "year": 2022
        })
    }

    fn messages(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(messages) => messages,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_body_becomes_book() {
        let book = CreateBook::parse(&full_body()).unwrap();
        assert_eq!(book.isbn, "0987654321");
        assert_eq!(book.pages, 200);
        assert_eq!(book.year, 2022);
    }

    #[test]
    fn test_create_collects_every_violation() {
        let body = json!({ "isbn": "0987654321", "title": "" });
        let messages = messages(CreateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec![
                "amazon_url: is required",
                "author: is required",
                "language: is required",
                "pages: is required",
                "publisher: is required",
                "title: must not be empty",
                "year: is required",
            ]
        );
    }

    #[test]
    fn test_create_reports_type_errors_with_other_violations() {
        let body = json!({ "isbn": 123, "title": "", "pages": "x" });
        let messages = messages(CreateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec![
                "amazon_url: is required",
                "author: is required",
                "isbn: must be a string",
                "language: is required",
                "pages: must be an integer",
                "publisher: is required",
                "title: must not be empty",
                "year: is required",
            ]
        );
    }

    #[test]
    fn test_create_rejects_negative_pages() {
        let mut body = full_body();
        body["pages"] = json!(-1);
        let messages = messages(CreateBook::parse(&body).unwrap_err());
        assert_eq!(messages, vec!["pages: must be greater than or equal to 0"]);
    }

    #[test]
    fn test_create_rejects_fractional_and_oversized_integers() {
        let mut body = full_body();
        body["pages"] = json!(12.5);
        body["year"] = json!(9_999_999_999i64);
        let messages = messages(CreateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec!["pages: must be an integer", "year: must be an integer"]
        );
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        let messages = messages(CreateBook::parse(&json!([1, 2])).unwrap_err());
        assert_eq!(messages, vec!["body: must be a JSON object"]);
        assert!(UpdateBook::parse(&json!("title")).is_err());
    }

    #[test]
    fn test_update_accepts_partial_body() {
        let payload = UpdateBook::parse(&json!({ "title": "Updated Book" })).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Updated Book"));
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_update_rejects_empty_strings() {
        let body = json!({ "amazon_url": "", "author": "" });
        let messages = messages(UpdateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec!["amazon_url: must not be empty", "author: must not be empty"]
        );
    }

    #[test]
    fn test_update_rejects_explicit_null() {
        let body = json!({ "title": null, "pages": null });
        let messages = messages(UpdateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec!["pages: must be an integer", "title: must be a string"]
        );
    }

    #[test]
    fn test_update_rejects_isbn_change() {
        let body = json!({ "isbn": "1111111111", "pages": -5 });
        let messages = messages(UpdateBook::parse(&body).unwrap_err());
        assert_eq!(
            messages,
            vec![
                "isbn: cannot be changed",
                "pages: must be greater than or equal to 0"
            ]
        );
    }

    #[test]
    fn test_empty_update_is_valid() {
        let payload = UpdateBook::parse(&json!({})).unwrap();
        assert!(payload.is_empty());
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_keeps_supplied_columns_in_table_order() {
        let filter = BookFilter::from_pairs(&pairs(&[
            ("year", "2021"),
            ("author", "Test Author"),
            ("sort", "desc"),
        ]));
        assert_eq!(
            filter.conditions,
            vec![
                (BookColumn::Author, vec!["Test Author".to_string()]),
                (BookColumn::Year, vec!["2021".to_string()]),
            ]
        );
    }

    #[test]
    fn test_filter_groups_repeated_keys() {
        let filter = BookFilter::from_pairs(&pairs(&[("year", "2021"), ("year", "2022")]));
        assert_eq!(
            filter.conditions,
            vec![(
                BookColumn::Year,
                vec!["2021".to_string(), "2022".to_string()]
            )]
        );
    }

    #[test]
    fn test_filter_empty_without_params() {
        assert!(BookFilter::from_pairs(&[]).is_empty());
    }
}
