//! Driver dispatch macros.
//!
//! The three drivers share one execution path that only differs in concrete
//! types, so the per-driver code is generated instead of written three times.

/// Match on a `DbPool`, binding the inner driver pool in every arm.
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => mysql::fetch_rows(p, sql, params).await,
///     Postgres(p) => postgres::fetch_rows(p, sql, params).await,
///     SQLite(p) => sqlite::fetch_rows(p, sql, params).await,
/// })
/// ```
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Generate a driver module with `fetch_rows` and `execute`.
///
/// `$driver` selects the placeholder style; `$last_id` extracts the last
/// insert id from the driver's query result, if it reports one.
macro_rules! impl_driver_executor {
    (
        $module:ident,
        db = $db:ty,
        pool = $pool:ty,
        driver = $driver:expr,
        last_id = $last_id:expr $(,)?
    ) => {
        mod $module {
            use super::*;

            pub async fn fetch_rows(
                pool: &$pool,
                sql: &str,
                params: &[QueryParam],
                limit: Option<usize>,
                query_timeout: Duration,
            ) -> DbResult<Vec<JsonRow>> {
                let prepared = prepare_sql($driver, sql)?;
                let limit = limit.unwrap_or(usize::MAX);

                // Without parameters run the raw text so statements that
                // cannot be prepared still work
                let rows_future = if params.is_empty() {
                    use sqlx::Executor;
                    pool.fetch(prepared.as_ref()).take(limit).collect::<Vec<_>>()
                } else {
                    let mut query = sqlx::query(prepared.as_ref());
                    for param in params {
                        query = bind_param(query, param);
                    }
                    query.fetch(pool).take(limit).collect::<Vec<_>>()
                };

                match timeout(query_timeout, rows_future).await {
                    Ok(results) => results
                        .into_iter()
                        .map(|row| {
                            row.map(|r| r.to_json_row())
                                .map_err(|e| DbError::from_sqlx(e, sql, params))
                        })
                        .collect(),
                    Err(_) => Err(timeout_error(sql, params, query_timeout)),
                }
            }

            pub async fn execute(
                pool: &$pool,
                sql: &str,
                params: &[QueryParam],
                query_timeout: Duration,
            ) -> DbResult<ExecuteResult> {
                let prepared = prepare_sql($driver, sql)?;

                let result = if params.is_empty() {
                    use sqlx::Executor;
                    timeout(query_timeout, pool.execute(prepared.as_ref())).await
                } else {
                    let mut query = sqlx::query(prepared.as_ref());
                    for param in params {
                        query = bind_param(query, param);
                    }
                    timeout(query_timeout, query.execute(pool)).await
                };

                match result {
                    Ok(Ok(r)) => Ok(ExecuteResult {
                        rows_affected: r.rows_affected(),
                        last_insert_id: ($last_id)(&r),
                    }),
                    Ok(Err(e)) => Err(DbError::from_sqlx(e, sql, params)),
                    Err(_) => Err(timeout_error(sql, params, query_timeout)),
                }
            }

            fn bind_param<'q>(
                query: sqlx::query::Query<'q, $db, <$db as sqlx::Database>::Arguments<'q>>,
                param: &'q QueryParam,
            ) -> sqlx::query::Query<'q, $db, <$db as sqlx::Database>::Arguments<'q>> {
                match param {
                    QueryParam::Null => query.bind(None::<String>),
                    QueryParam::Bool(v) => query.bind(*v),
                    QueryParam::Int(v) => query.bind(*v),
                    QueryParam::Float(v) => query.bind(*v),
                    QueryParam::String(v) => query.bind(v.as_str()),
                }
            }
        }
    };
}
