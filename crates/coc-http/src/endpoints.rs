//! Game-API endpoint table. A new endpoint is one more entry here plus, if
//! wanted, a typed wrapper on the client.

use coc_core::{
    models::{
        Clan, ClanMembers, ClanWar, ClanWarLeagueGroup, ClanWarLeagueWar, ClanWarLog, Player,
        Resource,
    },
    route::RouteTemplate,
};

use crate::dispatcher::Endpoint;

pub const GET_PLAYER: Endpoint<Player> = Endpoint::new(
    "get_player",
    RouteTemplate::get("/players/{tag}"),
    Player::from_record,
);

pub const GET_CLAN: Endpoint<Clan> = Endpoint::new(
    "get_clan",
    RouteTemplate::get("/clans/{tag}"),
    Clan::from_record,
);

pub const GET_CLAN_MEMBERS: Endpoint<ClanMembers> = Endpoint::new(
    "get_clan_members",
    RouteTemplate::get("/clans/{tag}/members"),
    ClanMembers::from_record,
);

pub const GET_CLAN_CURRENT_WAR: Endpoint<ClanWar> = Endpoint::new(
    "get_clan_current_war",
    RouteTemplate::get("/clans/{tag}/currentwar"),
    ClanWar::from_record,
);

pub const GET_CLAN_WAR_LOG: Endpoint<ClanWarLog> = Endpoint::new(
    "get_clan_war_log",
    RouteTemplate::get("/clans/{tag}/warlog"),
    ClanWarLog::from_record,
);

pub const GET_CLAN_WAR_LEAGUE_GROUP: Endpoint<ClanWarLeagueGroup> = Endpoint::new(
    "get_clan_war_league_group",
    RouteTemplate::get("/clans/{tag}/currentwar/leaguegroup"),
    ClanWarLeagueGroup::from_record,
);

pub const GET_CLAN_WAR_LEAGUE_WAR: Endpoint<ClanWarLeagueWar> = Endpoint::new(
    "get_clan_war_league_war",
    RouteTemplate::get("/clanwarleagues/wars/{tag}"),
    ClanWarLeagueWar::from_record,
);

/// Name and route of every registered endpoint.
pub fn catalog() -> [(&'static str, RouteTemplate); 7] {
    [
        (GET_PLAYER.name, GET_PLAYER.route),
        (GET_CLAN.name, GET_CLAN.route),
        (GET_CLAN_MEMBERS.name, GET_CLAN_MEMBERS.route),
        (GET_CLAN_CURRENT_WAR.name, GET_CLAN_CURRENT_WAR.route),
        (GET_CLAN_WAR_LOG.name, GET_CLAN_WAR_LOG.route),
        (GET_CLAN_WAR_LEAGUE_GROUP.name, GET_CLAN_WAR_LEAGUE_GROUP.route),
        (GET_CLAN_WAR_LEAGUE_WAR.name, GET_CLAN_WAR_LEAGUE_WAR.route),
    ]
}
