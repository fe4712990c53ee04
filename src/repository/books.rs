//! Books repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookFilter, UpdateBook},
};

const BOOK_COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List books in storage order, narrowed by equality filters
    pub async fn find_all(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let query = list_query(filter);

        let mut builder = sqlx::query_as::<_, Book>(&query);
        for (_, values) in &filter.conditions {
            builder = builder.bind(values);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        tracing::debug!(count = rows.len(), filters = filter.conditions.len(), "Listed books");
        Ok(rows)
    }

    /// Get a book by ISBN
    pub async fn find_one(&self, isbn: &str) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE isbn = $1", BOOK_COLUMNS))
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(isbn))
    }

    /// Insert a book, failing with a conflict when the ISBN is taken
    pub async fn create(&self, book: &Book) -> AppResult<Book> {
        let query = format!(
            r#"
            INSERT INTO books ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {cols}
            "#,
            cols = BOOK_COLUMNS
        );

        sqlx::query_as::<_, Book>(&query)
            .bind(&book.isbn)
            .bind(&book.amazon_url)
            .bind(&book.author)
            .bind(&book.language)
            .bind(book.pages)
            .bind(&book.publisher)
            .bind(&book.title)
            .bind(book.year)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    AppError::Conflict(format!("Book {} already exists", book.isbn))
                }
                other => AppError::Database(other),
            })
    }

    /// Apply the supplied fields to an existing book
    pub async fn update(&self, isbn: &str, data: &UpdateBook) -> AppResult<Book> {
        if data.is_empty() {
            return self.find_one(isbn).await;
        }

        let query = update_query(data);
        let mut builder = sqlx::query_as::<_, Book>(&query).bind(isbn);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.amazon_url);
        bind_field!(data.author);
        bind_field!(data.language);
        bind_field!(data.pages);
        bind_field!(data.publisher);
        bind_field!(data.title);
        bind_field!(data.year);

        builder
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(isbn))
    }

    /// Delete a book by ISBN
    pub async fn remove(&self, isbn: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = $1")
            .bind(isbn)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(isbn));
        }
        Ok(())
    }
}

fn not_found(isbn: &str) -> AppError {
    AppError::NotFound(format!("There is no book with an isbn '{}'", isbn))
}

/// SELECT statement for a filter, one `$n` text array placeholder per column
fn list_query(filter: &BookFilter) -> String {
    let conditions: Vec<String> = filter
        .conditions
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("CAST({} AS TEXT) = ANY(${})", column.as_str(), i + 1))
        .collect();

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    format!("SELECT {} FROM books{}", BOOK_COLUMNS, where_clause)
}

/// UPDATE statement for the supplied fields; `$1` is the ISBN
fn update_query(data: &UpdateBook) -> String {
    let mut sets: Vec<String> = Vec::new();

    // $1 is taken by the ISBN
    macro_rules! add_field {
        ($field:expr, $name:expr) => {
            if $field.is_some() {
                sets.push(format!("{} = ${}", $name, sets.len() + 2));
            }
        };
    }

    add_field!(data.amazon_url, "amazon_url");
    add_field!(data.author, "author");
    add_field!(data.language, "language");
    add_field!(data.pages, "pages");
    add_field!(data.publisher, "publisher");
    add_field!(data.title, "title");
    add_field!(data.year, "year");

    format!(
        "UPDATE books SET {} WHERE isbn = $1 RETURNING {}",
        sets.join(", "),
        BOOK_COLUMNS
    )
}
