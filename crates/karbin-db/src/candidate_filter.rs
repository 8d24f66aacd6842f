//! Candidate filter query builder.
//!
//! Renders a [`CandidateFilter`] into a parameterized SQL `WHERE` fragment
//! over `job_postings jp`. Every clause becomes one fragment; fragments are
//! joined with `AND`.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use karbin_core::{CandidateFilter, FilterClause};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// 64-bit integer parameter (ids, counts).
    BigInt(i64),
    /// 32-bit integer parameter.
    Int(i32),
    /// Boolean parameter.
    Bool(bool),
    /// Array of strings (for ANY operations).
    StringArray(Vec<String>),
}

/// Bind parameters in order onto a query.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<QueryParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::BigInt(v) => query.bind(v),
            QueryParam::Int(v) => query.bind(v),
            QueryParam::Bool(v) => query.bind(v),
            QueryParam::StringArray(v) => query.bind(v),
        };
    }
    query
}

/// Generates the SQL `WHERE` fragment for a candidate filter.
///
/// # Example
///
/// ```
/// use karbin_core::{CandidateFilter, FilterClause};
/// use karbin_db::candidate_filter::{CandidateFilterQueryBuilder, QueryParam};
///
/// let filter = CandidateFilter::base(45).with(FilterClause::Remote { remote: true });
/// let (sql, params) = CandidateFilterQueryBuilder::new(&filter, 0).build();
///
/// assert_eq!(
///     sql,
///     "jp.is_active = TRUE AND jp.scraped_at >= NOW() - make_interval(days => $1) AND jp.is_remote = TRUE"
/// );
/// assert_eq!(params, vec![QueryParam::Int(45)]);
/// ```
pub struct CandidateFilterQueryBuilder<'a> {
    filter: &'a CandidateFilter,
    param_offset: usize,
}

impl<'a> CandidateFilterQueryBuilder<'a> {
    /// Maximum provinces accepted in one membership clause.
    const MAX_FILTER_ELEMENTS: usize = 1000;

    /// Create a new builder.
    ///
    /// `param_offset` is the number of parameters already in the query; the
    /// first placeholder emitted is `$param_offset + 1`.
    pub fn new(filter: &'a CandidateFilter, param_offset: usize) -> Self {
        Self {
            filter,
            param_offset,
        }
    }

    /// Build the `WHERE` fragment and its parameters in placeholder order.
    ///
    /// An empty filter renders `TRUE`.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses = Vec::with_capacity(self.filter.len());
        let mut params = Vec::new();
        let mut param_idx = self.param_offset;

        for clause in self.filter.clauses() {
            let sql = match clause {
                FilterClause::Active => "jp.is_active = TRUE".to_string(),
                FilterClause::PostedWithin { days } => {
                    param_idx += 1;
                    params.push(QueryParam::Int(i32::try_from(*days).unwrap_or(i32::MAX)));
                    format!("jp.scraped_at >= NOW() - make_interval(days => ${param_idx})")
                }
                FilterClause::MinSkillOverlap { user_id, min } => {
                    params.push(QueryParam::BigInt(*user_id));
                    params.push(QueryParam::BigInt(i64::from(*min)));
                    let user_param = param_idx + 1;
                    let min_param = param_idx + 2;
                    param_idx += 2;
                    format!(
                        "(SELECT COUNT(DISTINCT js.skill_id) FROM job_skill js \
                         JOIN user_skills us ON us.skill_id = js.skill_id \
                         WHERE js.job_id = jp.id AND us.user_id = ${user_param}) >= ${min_param}"
                    )
                }
                FilterClause::Category { category_id } => {
                    param_idx += 1;
                    params.push(QueryParam::BigInt(*category_id));
                    format!("jp.category_id = ${param_idx}")
                }
                FilterClause::ProvinceIn { provinces } => {
                    if provinces.len() > Self::MAX_FILTER_ELEMENTS {
                        "FALSE".to_string()
                    } else {
                        param_idx += 1;
                        params.push(QueryParam::StringArray(provinces.clone()));
                        format!("jp.province = ANY(${param_idx}::text[])")
                    }
                }
                FilterClause::MaxExperience { level } => {
                    param_idx += 1;
                    params.push(QueryParam::Int(*level));
                    format!("COALESCE(jp.minimum_experience, 0) <= ${param_idx}")
                }
                FilterClause::FullTime => "jp.is_full_time = TRUE".to_string(),
                FilterClause::PartTime => "jp.is_part_time = TRUE".to_string(),
                FilterClause::Remote { remote: true } => "jp.is_remote = TRUE".to_string(),
                FilterClause::Remote { remote: false } => "jp.is_remote = FALSE".to_string(),
                FilterClause::Internship => "jp.is_internship = TRUE".to_string(),
            };
            clauses.push(sql);
        }

        if clauses.is_empty() {
            return ("TRUE".to_string(), params);
        }

        (clauses.join(" AND "), params)
    }

    /// Complete query selecting the ids of matching jobs.
    pub fn select_ids(&self) -> (String, Vec<QueryParam>) {
        let (where_clause, params) = self.build();
        (
            format!("SELECT jp.id FROM job_postings jp WHERE {where_clause}"),
            params,
        )
    }
}
