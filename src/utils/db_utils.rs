use chrono::NaiveDate;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Executor, FromRow, MySql, MySqlPool};

use crate::model::attendance::{Attendance, attendance_columns};
use crate::model::comp_off::CompOffSource;
use crate::model::outdoor_duty::{OutdoorDuty, outdoor_duty_columns};
use crate::model::settings::Settings;
use crate::rules::calendar::WorkCalendar;

/// Typed bind value for dynamically assembled WHERE clauses.
#[derive(Debug, Clone)]
pub enum FilterValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
    Bool(bool),
}

/// `AND`-joined conditions with their bind values, in placeholder order.
#[derive(Debug, Default)]
pub struct Filters {
    clauses: Vec<&'static str>,
    values: Vec<FilterValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: &'static str, value: FilterValue) -> &mut Self {
        self.clauses.push(clause);
        self.values.push(value);
        self
    }

    /// One clause with several placeholders, e.g. an `OR` group.
    pub fn push_many(
        &mut self,
        clause: &'static str,
        values: impl IntoIterator<Item = FilterValue>,
    ) -> &mut Self {
        self.clauses.push(clause);
        self.values.extend(values);
        self
    }

    pub fn push_opt<T>(
        &mut self,
        clause: &'static str,
        value: Option<T>,
        wrap: impl FnOnce(T) -> FilterValue,
    ) -> &mut Self {
        if let Some(v) = value {
            self.push(clause, wrap(v));
        }
        self
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn bind_as<'q, O>(
        &self,
        mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        for value in &self.values {
            query = match value {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(v) => query.bind(v.clone()),
                FilterValue::Date(v) => query.bind(*v),
                FilterValue::Bool(v) => query.bind(*v),
            };
        }
        query
    }

    pub fn bind_scalar<'q, O>(
        &self,
        mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        for value in &self.values {
            query = match value {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(v) => query.bind(v.clone()),
                FilterValue::Date(v) => query.bind(*v),
                FilterValue::Bool(v) => query.bind(*v),
            };
        }
        query
    }
}

/// Runs the COUNT and the LIMIT/OFFSET query of a list endpoint.
pub async fn fetch_page<O>(
    pool: &MySqlPool,
    columns: &str,
    table: &str,
    filters: &Filters,
    order_by: &str,
    per_page: u32,
    offset: u64,
) -> Result<(Vec<O>, i64), sqlx::Error>
where
    O: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let where_sql = filters.where_sql();

    let count_sql = format!("SELECT COUNT(*) FROM {table}{where_sql}");
    let total = filters
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "SELECT {columns} FROM {table}{where_sql} ORDER BY {order_by} LIMIT ? OFFSET ?"
    );
    let rows = filters
        .bind_as(sqlx::query_as::<_, O>(&data_sql))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

pub async fn holidays_between(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Calendar covering `from..=to` with the holidays of that range loaded.
pub async fn work_calendar(
    pool: &MySqlPool,
    settings: &Settings,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<WorkCalendar, sqlx::Error> {
    let holidays = holidays_between(pool, from, to).await?;
    Ok(settings.calendar(holidays))
}

pub async fn attendance_for_day<'e, E>(
    executor: E,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(concat!(
        "SELECT ",
        attendance_columns!(),
        " FROM attendance WHERE user_id = ? AND date = ?"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(executor)
    .await
}

pub async fn attendance_by_id<'e, E>(
    executor: E,
    id: u64,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(concat!(
        "SELECT ",
        attendance_columns!(),
        " FROM attendance WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Approved duties of one user on one date, earliest first.
pub async fn approved_duties_on<'e, E>(
    executor: E,
    user_id: u64,
    date: NaiveDate,
) -> Result<Vec<OutdoorDuty>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, OutdoorDuty>(concat!(
        "SELECT ",
        outdoor_duty_columns!(),
        " FROM outdoor_duties WHERE user_id = ? AND date = ? AND status = 'approved' \
         ORDER BY start_time"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_all(executor)
    .await
}

pub async fn on_approved_leave<'e, E>(
    executor: E,
    user_id: u64,
    date: NaiveDate,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let found: i64 = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leaves
            WHERE user_id = ? AND status = 'approved' AND start_date <= ? AND end_date >= ?
        )
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(date)
    .fetch_one(executor)
    .await?;
    Ok(found != 0)
}

/// Returns false when the user already holds an entry for that date.
pub async fn credit_comp_off<'e, E>(
    executor: E,
    user_id: u64,
    earned_date: NaiveDate,
    source: CompOffSource,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO comp_offs (user_id, earned_date, source, used, created_at)
        VALUES (?, ?, ?, 0, UTC_TIMESTAMP())
        "#,
    )
    .bind(user_id)
    .bind(earned_date)
    .bind(source.to_string())
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_joins_conditions() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_sql(), "");

        filters
            .push("user_id = ?", FilterValue::U64(3))
            .push_opt("status = ?", Some("late".to_string()), FilterValue::Str)
            .push_opt("date >= ?", None::<NaiveDate>, FilterValue::Date);

        assert_eq!(filters.where_sql(), " WHERE user_id = ? AND status = ?");
        assert_eq!(filters.values.len(), 2);
    }
}
