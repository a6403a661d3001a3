// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::Result;
use crate::session::Session;

use super::print_json;

pub async fn run(session: &Session, entity: &str, id: &str) -> Result<()> {
    let gateway = session.engine.gateway(entity)?;
    session.connect().await;

    let record = gateway
        .get(id)
        .await?
        .ok_or_else(|| cx_core::Error::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })?;
    print_json(&record)
}
