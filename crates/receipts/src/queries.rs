//! Runtime SQL queries for the receipt database

use mia_errors::{Error, UninstallError};
use mia_platform::{PackageFile, PackageInfo};
use sqlx::{query, Pool, QueryBuilder, Row, Sqlite, SqliteConnection};

/// Insert a package row and return its key
pub async fn insert_package(conn: &mut SqliteConnection, info: &PackageInfo) -> Result<i64, Error> {
    let result = query(
        "INSERT INTO pkgs (timestamp, owner, pkgid, vers, ppath, pkgname)
         VALUES (?1, 0, ?2, ?3, ?4, ?2)",
    )
    .bind(info.install_time)
    .bind(&info.package_id)
    .bind(&info.version)
    .bind(&info.location)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Key of `path`, inserting the row on first sight
pub async fn path_key(conn: &mut SqliteConnection, path: &str) -> Result<i64, Error> {
    query("INSERT OR IGNORE INTO paths (path) VALUES (?1)")
        .bind(path)
        .execute(&mut *conn)
        .await?;

    let row = query("SELECT path_key FROM paths WHERE path = ?1")
        .bind(path)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("path_key"))
}

pub async fn insert_package_path(
    conn: &mut SqliteConnection,
    pkg_key: i64,
    path_key: i64,
    file: &PackageFile,
) -> Result<(), Error> {
    query("INSERT INTO pkgs_paths (pkg_key, path_key, uid, gid, perms) VALUES (?1, ?2, ?3, ?4, ?5)")
        .bind(pkg_key)
        .bind(path_key)
        .bind(file.uid)
        .bind(file.gid)
        .bind(file.mode)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Keys of the named packages, looked up by identifier then receipt name
///
/// All or nothing: if any name is unknown the result is
/// `UninstallError::PackageNotInDatabase` naming every missing package.
pub async fn package_keys(pool: &Pool<Sqlite>, names: &[String]) -> Result<Vec<i64>, Error> {
    let mut keys = Vec::new();
    let mut missing = Vec::new();

    for name in names {
        let mut rows = query("SELECT pkg_key FROM pkgs WHERE pkgid = ?1")
            .bind(name)
            .fetch_all(pool)
            .await?;
        if rows.is_empty() {
            rows = query("SELECT pkg_key FROM pkgs WHERE pkgname = ?1")
                .bind(name)
                .fetch_all(pool)
                .await?;
        }
        if rows.is_empty() {
            missing.push(name.as_str());
        }
        keys.extend(rows.iter().map(|row| row.get::<i64, _>("pkg_key")));
    }

    if missing.is_empty() {
        Ok(keys)
    } else {
        Err(UninstallError::PackageNotInDatabase {
            package: missing.join(", "),
        }
        .into())
    }
}

/// Paths referenced by a package in `keys` and by no package outside it
pub async fn paths_owned_only_by(pool: &Pool<Sqlite>, keys: &[i64]) -> Result<Vec<String>, Error> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT path FROM paths WHERE path_key IN \
         (SELECT DISTINCT path_key FROM pkgs_paths WHERE pkg_key IN (",
    );
    let mut selected = builder.separated(", ");
    for key in keys {
        selected.push_bind(*key);
    }
    selected.push_unseparated(
        ")) AND path_key NOT IN \
         (SELECT DISTINCT path_key FROM pkgs_paths WHERE pkg_key NOT IN (",
    );
    let mut others = builder.separated(", ");
    for key in keys {
        others.push_bind(*key);
    }
    builder.push(")) ORDER BY path");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(|row| row.get("path")).collect())
}

/// Delete the package rows and their path links; returns the identifiers
pub async fn delete_packages(pool: &Pool<Sqlite>, keys: &[i64]) -> Result<Vec<String>, Error> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut tx = pool.begin().await?;

    let mut select = QueryBuilder::<Sqlite>::new("SELECT pkgid FROM pkgs WHERE pkg_key IN (");
    push_keys(&mut select, keys);
    let identifiers: Vec<String> = select
        .build()
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.get("pkgid"))
        .collect();

    let mut links = QueryBuilder::<Sqlite>::new("DELETE FROM pkgs_paths WHERE pkg_key IN (");
    push_keys(&mut links, keys);
    links.build().execute(&mut *tx).await?;

    let mut packages = QueryBuilder::<Sqlite>::new("DELETE FROM pkgs WHERE pkg_key IN (");
    push_keys(&mut packages, keys);
    packages.build().execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(identifiers)
}

fn push_keys(builder: &mut QueryBuilder<'_, Sqlite>, keys: &[i64]) {
    let mut separated = builder.separated(", ");
    for key in keys {
        separated.push_bind(*key);
    }
    builder.push(")");
}

/// Delete path rows no package references any more
pub async fn prune_orphaned_paths(pool: &Pool<Sqlite>) -> Result<u64, Error> {
    let result = query(
        "DELETE FROM paths WHERE path_key NOT IN (SELECT DISTINCT path_key FROM pkgs_paths)",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn package_count(pool: &Pool<Sqlite>) -> Result<i64, Error> {
    let row = query("SELECT COUNT(*) AS count FROM pkgs")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

pub async fn path_count(pool: &Pool<Sqlite>) -> Result<i64, Error> {
    let row = query("SELECT COUNT(*) AS count FROM paths")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}
