use std::sync::Arc;

use coc_core::{
    config::Config,
    domain::Session,
    errors::Error,
    models::{
        Clan, ClanMembers, ClanWar, ClanWarLeagueGroup, ClanWarLeagueWar, ClanWarLog, Page, Player,
    },
    ports::EgressLookup,
    throttle::Throttler,
    Result,
};
use tokio::sync::RwLock;

use crate::{
    auth::SessionAuthenticator,
    dispatcher::{Call, Dispatcher, Endpoint},
    egress::HttpEgressLookup,
    endpoints,
};

/// Authenticated, throttled client for the game API.
///
/// One instance owns one connection pool, one throttle and one session.
/// Endpoint calls wait while a login is in progress and fail with an
/// authentication error when no session is ready.
pub struct CocClient {
    cfg: Config,
    auth: SessionAuthenticator,
    dispatcher: Dispatcher,
    session: RwLock<Option<Session>>,
}

impl CocClient {
    pub fn new(cfg: Config) -> Result<Self> {
        let http = build_http(&cfg)?;
        let egress = Arc::new(HttpEgressLookup::new(http.clone(), cfg.egress_url.clone()));
        Self::with_parts(cfg, http, egress)
    }

    /// Like [`CocClient::new`], with a custom egress lookup.
    pub fn with_egress(cfg: Config, egress: Arc<dyn EgressLookup>) -> Result<Self> {
        let http = build_http(&cfg)?;
        Self::with_parts(cfg, http, egress)
    }

    fn with_parts(cfg: Config, http: reqwest::Client, egress: Arc<dyn EgressLookup>) -> Result<Self> {
        let throttler = Throttler::new(cfg.throttle)?;
        let auth = SessionAuthenticator::new(http.clone(), cfg.developer_base_url.clone(), egress);
        let dispatcher = Dispatcher::new(
            http,
            cfg.api_base_url.clone(),
            throttler,
            cfg.request_timeout,
        );
        Ok(Self {
            cfg,
            auth,
            dispatcher,
            session: RwLock::new(None),
        })
    }

    /// Build a client and log in.
    pub async fn connect(cfg: Config) -> Result<Self> {
        let client = Self::new(cfg)?;
        client.login().await?;
        Ok(client)
    }

    /// Run the full login sequence and install the resulting session.
    ///
    /// The session lock is held throughout, so endpoint calls issued meanwhile
    /// wait for the outcome. A failed login leaves no session behind.
    pub async fn login(&self) -> Result<()> {
        let mut slot = self.session.write().await;
        *slot = None;
        let session = self
            .auth
            .authenticate(&self.cfg.email, &self.cfg.password)
            .await
            .inspect_err(|e| tracing::error!(kind = %e.kind(), error = %e, "login failed"))?;
        *slot = Some(session);
        Ok(())
    }

    /// Forget the session; calls fail until the next [`CocClient::login`].
    pub async fn logout(&self) {
        *self.session.write().await = None;
        tracing::info!("logged out");
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .map(Session::is_ready)
            .unwrap_or(false)
    }

    pub fn throttler(&self) -> &Throttler {
        self.dispatcher.throttler()
    }

    pub fn authenticator(&self) -> &SessionAuthenticator {
        &self.auth
    }

    async fn token(&self) -> Result<String> {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.resolved_token.clone())
            .ok_or_else(|| Error::auth("not logged in: call login() first", None))
    }

    /// Call any endpoint from the table (or a caller-defined one).
    pub async fn call<T>(&self, endpoint: &Endpoint<T>, call: Call<'_>) -> Result<T> {
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(
                    endpoint = endpoint.name,
                    route = %endpoint.route,
                    args = ?call.path_args,
                    query = ?call.query,
                    kind = %e.kind(),
                    error = %e,
                    "request failed"
                );
                return Err(e);
            }
        };
        self.dispatcher.dispatch(endpoint, &token, call).await
    }

    async fn by_tag<T>(&self, endpoint: &Endpoint<T>, tag: &str, page: Option<&Page>) -> Result<T> {
        let args = [("tag", tag)];
        let call = Call {
            path_args: &args,
            query: page.map(Page::to_query).unwrap_or_default(),
            body: None,
        };
        self.call(endpoint, call).await
    }

    pub async fn get_player(&self, tag: impl AsRef<str>) -> Result<Player> {
        self.by_tag(&endpoints::GET_PLAYER, tag.as_ref(), None).await
    }

    pub async fn get_clan(&self, tag: impl AsRef<str>) -> Result<Clan> {
        self.by_tag(&endpoints::GET_CLAN, tag.as_ref(), None).await
    }

    pub async fn get_clan_members(&self, tag: impl AsRef<str>) -> Result<ClanMembers> {
        self.by_tag(&endpoints::GET_CLAN_MEMBERS, tag.as_ref(), None)
            .await
    }

    pub async fn get_clan_members_page(
        &self,
        tag: impl AsRef<str>,
        page: &Page,
    ) -> Result<ClanMembers> {
        self.by_tag(&endpoints::GET_CLAN_MEMBERS, tag.as_ref(), Some(page))
            .await
    }

    pub async fn get_clan_current_war(&self, tag: impl AsRef<str>) -> Result<ClanWar> {
        self.by_tag(&endpoints::GET_CLAN_CURRENT_WAR, tag.as_ref(), None)
            .await
    }

    pub async fn get_clan_war_log(&self, tag: impl AsRef<str>) -> Result<ClanWarLog> {
        self.by_tag(&endpoints::GET_CLAN_WAR_LOG, tag.as_ref(), None)
            .await
    }

    pub async fn get_clan_war_log_page(
        &self,
        tag: impl AsRef<str>,
        page: &Page,
    ) -> Result<ClanWarLog> {
        self.by_tag(&endpoints::GET_CLAN_WAR_LOG, tag.as_ref(), Some(page))
            .await
    }

    pub async fn get_clan_war_league_group(
        &self,
        tag: impl AsRef<str>,
    ) -> Result<ClanWarLeagueGroup> {
        self.by_tag(&endpoints::GET_CLAN_WAR_LEAGUE_GROUP, tag.as_ref(), None)
            .await
    }

    pub async fn get_clan_war_league_war(
        &self,
        war_tag: impl AsRef<str>,
    ) -> Result<ClanWarLeagueWar> {
        self.by_tag(&endpoints::GET_CLAN_WAR_LEAGUE_WAR, war_tag.as_ref(), None)
            .await
    }
}

fn build_http(cfg: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .build()
        .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))
}
