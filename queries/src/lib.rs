use chrono::NaiveDate;
use entities::group::GroupSqlxModel;
use entities::song::{Song, SongSqlxModel};
use log::{debug, error, info, warn};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};
use thiserror::Error;

/// Release dates travel as text in day.month.year form.
pub const RELEASE_DATE_FORMAT: &str = "%d.%m.%Y";
/// Zero-value date some clients send instead of omitting the filter.
pub const NO_DATE_SENTINEL: &str = "01.01.0001";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no song named {0:?} for group {1:?}")]
    SongNotFound(String, String),
    #[error("verse {0} not found")]
    VerseNotFound(i64),
    #[error("group {0:?} not found")]
    GroupNotFound(String),
    #[error("no fields to update")]
    EmptyPatch,
    #[error("unparseable release date {0:?}")]
    UnparseableDate(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(FromRow)]
struct ReturnId {
    id: i32,
}

#[derive(FromRow)]
struct TextAndId {
    text: String,
    id: i32,
}

pub fn parse_release_date(value: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(value, RELEASE_DATE_FORMAT)
        .map_err(|_| QueryError::UnparseableDate(value.to_string()))
}

pub fn format_release_date(date: NaiveDate) -> String {
    date.format(RELEASE_DATE_FORMAT).to_string()
}

fn parse_or_warn(value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, RELEASE_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(err) => {
            warn!("Skipping unparseable release date {:?}: {}", value, err);
            None
        }
    }
}

// Empty string and the zero-value sentinel both mean "no date filter".
fn release_date_filter(value: &str) -> Option<NaiveDate> {
    if value.is_empty() || value == NO_DATE_SENTINEL {
        return None;
    }
    parse_or_warn(value)
}

fn build_songs_query(filter: &Song, limit: i64, offset: i64) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT s.id, g.name AS group_name, s.song_name, s.release_date, s.link, s.text \
         FROM songs AS s JOIN groups g ON g.id = s.group_id WHERE 1=1",
    );
    if let Some(song_name) = filter.song_name.as_deref().filter(|v| !v.is_empty()) {
        builder.push(" AND s.song_name LIKE ");
        builder.push_bind(format!("%{}%", song_name));
    }
    if let Some(group) = filter.group.as_deref().filter(|v| !v.is_empty()) {
        builder.push(" AND g.name LIKE ");
        builder.push_bind(format!("%{}%", group));
    }
    if let Some(text) = filter.text.as_deref().filter(|v| !v.is_empty()) {
        builder.push(" AND s.text LIKE ");
        builder.push_bind(format!("%{}%", text));
    }
    if let Some(link) = filter.link.as_deref().filter(|v| !v.is_empty()) {
        builder.push(" AND s.link LIKE ");
        builder.push_bind(format!("%{}%", link));
    }
    if let Some(date) = filter.release_date.as_deref().and_then(release_date_filter) {
        builder.push(" AND s.release_date > ");
        builder.push_bind(date);
    }
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);
    builder
}

pub async fn get_songs(
    pool: &Pool<Postgres>,
    filter: &Song,
    page: i64,
    limit: i64,
) -> Result<Vec<Song>, QueryError> {
    info!("Listing songs, page {} limit {}", page, limit);
    let offset = (page - 1) * limit;
    let mut builder = build_songs_query(filter, limit, offset);
    debug!("Built query: {}", builder.sql());
    let rows: Vec<SongSqlxModel> = builder.build_query_as().fetch_all(pool).await?;
    let songs: Vec<Song> = rows
        .into_iter()
        .map(|row| Song {
            id: Some(row.id),
            group: Some(row.group_name),
            song_name: Some(row.song_name),
            release_date: Some(format_release_date(row.release_date)),
            link: Some(row.link),
            text: Some(row.text),
        })
        .collect();
    info!("Listed {} songs", songs.len());
    Ok(songs)
}

fn select_verse(text: &str, verse: i64) -> Result<&str, QueryError> {
    let verses: Vec<&str> = text.split("\n\n").collect();
    if verse < 1 || verse > verses.len() as i64 {
        return Err(QueryError::VerseNotFound(verse));
    }
    Ok(verses[(verse - 1) as usize])
}

pub async fn get_song_verse(
    pool: &Pool<Postgres>,
    song: &Song,
    verse: i64,
) -> Result<(String, i32), QueryError> {
    let song_name = song.song_name.as_deref().unwrap_or_default();
    let group_name = song.group.as_deref().unwrap_or_default();
    info!("Fetching verse {} of {:?} by {:?}", verse, song_name, group_name);
    let row = sqlx::query_as::<_, TextAndId>(
        "SELECT s.text, s.id FROM songs AS s \
         JOIN groups g ON g.id = s.group_id \
         WHERE s.song_name = $1 AND g.name = $2",
    )
    .bind(song_name)
    .bind(group_name)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        error!("No song named {:?} for group {:?}", song_name, group_name);
        return Err(QueryError::SongNotFound(
            song_name.to_string(),
            group_name.to_string(),
        ));
    };
    let verse_text = select_verse(&row.text, verse)?;
    info!("Fetched verse {} of song {}", verse, row.id);
    Ok((verse_text.to_string(), row.id))
}

fn build_update_query(
    song_name: &str,
    group_name: &str,
    patch: &Song,
    group_id: Option<i32>,
) -> Result<QueryBuilder<'static, Postgres>, QueryError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE songs SET ");
    let mut fields = 0;
    {
        let mut separated = builder.separated(", ");
        if let Some(song_name) = &patch.song_name {
            separated
                .push("song_name = ")
                .push_bind_unseparated(song_name.to_owned());
            fields += 1;
        }
        if let Some(text) = &patch.text {
            separated
                .push("text = ")
                .push_bind_unseparated(text.to_owned());
            fields += 1;
        }
        if let Some(link) = &patch.link {
            separated
                .push("link = ")
                .push_bind_unseparated(link.to_owned());
            fields += 1;
        }
        if let Some(date) = patch.release_date.as_deref().and_then(parse_or_warn) {
            separated.push("release_date = ").push_bind_unseparated(date);
            fields += 1;
        }
        if let Some(group_id) = group_id {
            separated.push("group_id = ").push_bind_unseparated(group_id);
            fields += 1;
        }
    }
    if fields == 0 {
        return Err(QueryError::EmptyPatch);
    }
    builder.push(" WHERE song_name = ");
    builder.push_bind(song_name.to_string());
    builder.push(" AND EXISTS (SELECT 1 FROM groups WHERE name = ");
    builder.push_bind(group_name.to_string());
    builder.push(")");
    Ok(builder)
}

pub async fn update_song(
    pool: &Pool<Postgres>,
    song_name: &str,
    group_name: &str,
    patch: &Song,
) -> Result<bool, QueryError> {
    info!("Updating song {:?} of group {:?}", song_name, group_name);
    let group_id = match patch.group.as_deref() {
        Some(name) => Some(get_or_create_group(pool, name).await?.id),
        None => None,
    };
    let mut builder = build_update_query(song_name, group_name, patch, group_id)?;
    debug!("Built query: {}", builder.sql());
    let result = builder.build().execute(pool).await?;
    if result.rows_affected() == 0 {
        warn!("No song matched {:?} for group {:?}", song_name, group_name);
        return Ok(false);
    }
    info!("Song {:?} updated", song_name);
    Ok(true)
}

pub async fn add_song(pool: &Pool<Postgres>, song: &Song) -> Result<i32, QueryError> {
    let song_name = song.song_name.as_deref().unwrap_or_default();
    let group_name = song.group.as_deref().unwrap_or_default();
    info!("Adding song {:?} by {:?}", song_name, group_name);
    let group = get_or_create_group(pool, group_name).await?;
    // Unlike filtering, the date is mandatory on insert.
    let date_value = song.release_date.as_deref().unwrap_or_default();
    let date = parse_release_date(date_value).map_err(|err| {
        error!("{}", err);
        err
    })?;
    let row = sqlx::query_as::<_, ReturnId>(
        "INSERT INTO songs (group_id, song_name, release_date, text, link) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(group.id)
    .bind(song_name)
    .bind(date)
    .bind(song.text.as_deref().unwrap_or_default())
    .bind(song.link.as_deref().unwrap_or_default())
    .fetch_one(pool)
    .await?;
    info!("Song added with id {}", row.id);
    Ok(row.id)
}

pub async fn delete_song(pool: &Pool<Postgres>, song: &Song) -> Result<bool, QueryError> {
    let song_name = song.song_name.as_deref().unwrap_or_default();
    let group_name = song.group.as_deref().unwrap_or_default();
    info!("Deleting song {:?} by {:?}", song_name, group_name);
    // Deletion never creates the group on the fly.
    let group = get_group(pool, group_name).await?;
    sqlx::query("DELETE FROM songs WHERE group_id = $1 AND song_name = $2")
        .bind(group.id)
        .bind(song_name)
        .execute(pool)
        .await?;
    info!("Song {:?} deleted", song_name);
    Ok(true)
}

pub async fn get_group(pool: &Pool<Postgres>, name: &str) -> Result<GroupSqlxModel, QueryError> {
    let group = sqlx::query_as::<_, GroupSqlxModel>("SELECT id, name FROM groups WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    group.ok_or_else(|| QueryError::GroupNotFound(name.to_string()))
}

pub async fn get_or_create_group(
    pool: &Pool<Postgres>,
    name: &str,
) -> Result<GroupSqlxModel, QueryError> {
    match get_group(pool, name).await {
        Ok(group) => Ok(group),
        Err(QueryError::GroupNotFound(_)) => {
            info!("Group {:?} not found, creating it", name);
            let row =
                sqlx::query_as::<_, ReturnId>("INSERT INTO groups (name) VALUES ($1) RETURNING id")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
            Ok(GroupSqlxModel {
                id: row.id,
                name: name.to_string(),
            })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str =
        "SELECT s.id, g.name AS group_name, s.song_name, s.release_date, s.link, s.text \
         FROM songs AS s JOIN groups g ON g.id = s.group_id WHERE 1=1";

    fn filter(
        song_name: Option<&str>,
        group: Option<&str>,
        text: Option<&str>,
        link: Option<&str>,
        date: Option<&str>,
    ) -> Song {
        Song {
            song_name: song_name.map(str::to_string),
            group: group.map(str::to_string),
            text: text.map(str::to_string),
            link: link.map(str::to_string),
            release_date: date.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn songs_query_without_filters_is_base_plus_paging() {
        let sql = build_songs_query(&Song::default(), 10, 0).into_sql();
        assert_eq!(sql, format!("{} LIMIT $1 OFFSET $2", BASE));
    }

    #[test]
    fn songs_query_skips_empty_string_filters() {
        let sql =
            build_songs_query(&filter(Some(""), Some(""), Some(""), Some(""), Some("")), 10, 0)
                .into_sql();
        assert_eq!(sql, format!("{} LIMIT $1 OFFSET $2", BASE));
    }

    #[test]
    fn songs_query_appends_like_clauses_in_order() {
        let sql = build_songs_query(
            &filter(Some("Uprising"), Some("Muse"), None, None, None),
            5,
            10,
        )
        .into_sql();
        assert_eq!(
            sql,
            format!(
                "{} AND s.song_name LIKE $1 AND g.name LIKE $2 LIMIT $3 OFFSET $4",
                BASE
            )
        );
    }

    #[test]
    fn songs_query_with_every_filter() {
        let sql = build_songs_query(
            &filter(
                Some("Uprising"),
                Some("Muse"),
                Some("paranoia"),
                Some("youtube"),
                Some("19.07.2006"),
            ),
            5,
            10,
        )
        .into_sql();
        assert_eq!(
            sql,
            format!(
                "{} AND s.song_name LIKE $1 AND g.name LIKE $2 AND s.text LIKE $3 \
                 AND s.link LIKE $4 AND s.release_date > $5 LIMIT $6 OFFSET $7",
                BASE
            )
        );
    }

    #[test]
    fn songs_query_ignores_sentinel_and_garbage_dates() {
        for date in [NO_DATE_SENTINEL, "", "2006-07-19", "not a date"] {
            let sql =
                build_songs_query(&filter(None, None, None, None, Some(date)), 10, 0).into_sql();
            assert_eq!(sql, format!("{} LIMIT $1 OFFSET $2", BASE), "date {:?}", date);
        }
    }

    #[test]
    fn release_date_round_trips() {
        let date = parse_release_date("19.07.2006").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2006, 7, 19).unwrap());
        assert_eq!(format_release_date(date), "19.07.2006");
    }

    #[test]
    fn release_date_rejects_other_formats() {
        assert!(matches!(
            parse_release_date("2006-07-19"),
            Err(QueryError::UnparseableDate(_))
        ));
        assert!(matches!(
            parse_release_date(""),
            Err(QueryError::UnparseableDate(_))
        ));
    }

    #[test]
    fn verses_split_on_blank_lines() {
        let text = "A\n\nB\n\nC";
        assert_eq!(select_verse(text, 1).unwrap(), "A");
        assert_eq!(select_verse(text, 2).unwrap(), "B");
        assert_eq!(select_verse(text, 3).unwrap(), "C");
    }

    #[test]
    fn verse_index_is_one_based_and_bounded() {
        let text = "A\n\nB\n\nC";
        assert!(matches!(
            select_verse(text, 0),
            Err(QueryError::VerseNotFound(0))
        ));
        assert!(matches!(
            select_verse(text, 4),
            Err(QueryError::VerseNotFound(4))
        ));
    }

    #[test]
    fn single_paragraph_text_is_one_verse() {
        assert_eq!(select_verse("only verse", 1).unwrap(), "only verse");
        assert!(select_verse("only verse", 2).is_err());
    }

    #[test]
    fn update_query_with_text_only_sets_one_column() {
        let patch = filter(None, None, Some("new text"), None, None);
        let sql = build_update_query("Uprising", "Muse", &patch, None)
            .unwrap()
            .into_sql();
        assert_eq!(
            sql,
            "UPDATE songs SET text = $1 WHERE song_name = $2 \
             AND EXISTS (SELECT 1 FROM groups WHERE name = $3)"
        );
    }

    #[test]
    fn update_query_joins_clauses_with_commas() {
        let patch = Song {
            song_name: Some("Hysteria".to_string()),
            text: Some("new text".to_string()),
            link: Some("https://example.com".to_string()),
            release_date: Some("01.12.2003".to_string()),
            ..Default::default()
        };
        let sql = build_update_query("Uprising", "Muse", &patch, Some(7))
            .unwrap()
            .into_sql();
        assert_eq!(
            sql,
            "UPDATE songs SET song_name = $1, text = $2, link = $3, release_date = $4, \
             group_id = $5 WHERE song_name = $6 \
             AND EXISTS (SELECT 1 FROM groups WHERE name = $7)"
        );
    }

    #[test]
    fn update_query_skips_unparseable_patch_date() {
        let patch = filter(None, None, Some("new text"), None, Some("not a date"));
        let sql = build_update_query("Uprising", "Muse", &patch, None)
            .unwrap()
            .into_sql();
        assert!(!sql.contains("release_date"));
    }

    #[test]
    fn update_query_rejects_empty_patch() {
        assert!(matches!(
            build_update_query("Uprising", "Muse", &Song::default(), None),
            Err(QueryError::EmptyPatch)
        ));
        // A patch whose only field failed to parse is empty too.
        let patch = filter(None, None, None, None, Some("not a date"));
        assert!(matches!(
            build_update_query("Uprising", "Muse", &patch, None),
            Err(QueryError::EmptyPatch)
        ));
    }
}
