//! Refresh-token revocation list kept in Redis.
//! An entry lives exactly as long as the token it revokes.

use redis::aio::MultiplexedConnection;
use redis::RedisResult;
use uuid::Uuid;

use crate::auth::tokens::Claims;

fn revoked_key(jti: Uuid) -> String {
    format!("auth:revoked:{jti}")
}

pub async fn revoke(conn: &MultiplexedConnection, claims: &Claims) -> RedisResult<()> {
    let ttl = claims.remaining_secs().max(1);
    let mut conn = conn.clone();
    redis::cmd("SET")
        .arg(revoked_key(claims.jti))
        .arg(1)
        .arg("EX")
        .arg(ttl)
        .query_async::<_, ()>(&mut conn)
        .await
}

pub async fn is_revoked(conn: &MultiplexedConnection, jti: Uuid) -> RedisResult<bool> {
    let mut conn = conn.clone();
    redis::cmd("EXISTS")
        .arg(revoked_key(jti))
        .query_async::<_, bool>(&mut conn)
        .await
}
