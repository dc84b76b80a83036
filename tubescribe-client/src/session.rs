/* This file is part of the TubeScribe project - https://github.com/tubescribe/tubescribe
*
*  Copyright (C) 2025 TubeScribe contributors
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;

use cloneable_errors::{anyhow, ErrContext};
use log::{debug, info};

use crate::attestation::{self, AttestationRunner};
use crate::constants::VISITOR_DATA_REGEX;
use crate::errors::Error;
use crate::state::AppConfig;
use crate::transport::PlatformTransport;

/// The single authenticated session of this process. The access token is only
/// ever presented together with the visitor identity that minted it - the
/// platform rejects the pair otherwise. Never torn down explicitly.
pub struct AuthenticatedSession {
    pub visitor_data: Arc<str>,
    pub access_token: Arc<str>,
    pub cookie: Option<String>,
}

/// One full bootstrap: scrape a visitor identity from the unauthenticated
/// page, run the minter, assemble the session. Memoization lives in
/// [`crate::state::SessionCache`] - this function performs the work
/// unconditionally.
pub(crate) async fn build_session(
    config: Arc<AppConfig>,
    transport: Arc<dyn PlatformTransport>,
    runner: Arc<dyn AttestationRunner>,
) -> Result<Arc<AuthenticatedSession>, Error> {
    info!("Bootstrapping a new authenticated session");
    let cookie = config.cookie.clone();
    let page = transport.bootstrap_page(cookie.as_deref()).await
        .map_err(|e| Error::BootstrapFailed(e.context("Failed to fetch the bootstrap page")))?;
    let visitor_data = VISITOR_DATA_REGEX.captures(&page)
        .map(|captures| captures[1].to_owned())
        .ok_or_else(|| Error::BootstrapFailed(anyhow!("no visitor identity found in the bootstrap page")))?;
    debug!("Obtained a visitor identity ({} chars)", visitor_data.len());

    let access_token = attestation::mint_access_token(&config, transport.as_ref(), runner.as_ref(), &visitor_data).await?;
    info!("Authenticated session ready");

    Ok(Arc::new(AuthenticatedSession {
        visitor_data: visitor_data.into(),
        access_token: access_token.into(),
        cookie,
    }))
}
