#![deny(warnings)]

//! Headless CLI: founds a demo barony and runs monthly ticks, printing each
//! tick's report as JSON.

use anyhow::{Context, Result};
use sim_core::{
    ActorId, ActorKind, Catalog, EconomyConfig, Estate, Homeward, Npc, NpcTier, Resource,
    ResourceDelta,
};
use sim_econ::LedgerInputs;
use sim_runtime::{
    ActionType, Barony, BuildOrder, PlannedAction, PlayerCharacter, Role, ScriptedActions,
    TurnEngine,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_CATALOG: &str = include_str!("../assets/catalog.yaml");

#[derive(Debug, Default)]
struct Args {
    months: Option<u32>,
    catalog: Option<String>,
    config: Option<String>,
    tax_exempt: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--months" => args.months = it.next().and_then(|s| s.parse().ok()),
            "--catalog" => args.catalog = it.next(),
            "--config" => args.config = it.next(),
            "--tax-exempt" => args.tax_exempt = true,
            _ => {}
        }
    }
    args
}

fn load_catalog(path: Option<&str>) -> Result<Catalog> {
    let Some(path) = path else {
        return Catalog::from_yaml_str(DEMO_CATALOG).context("parsing built-in catalog");
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let catalog = if path.ends_with(".json") {
        Catalog::from_json_str(&text)
    } else {
        Catalog::from_yaml_str(&text)
    };
    catalog.with_context(|| format!("loading catalog {path}"))
}

fn load_config(path: Option<&str>) -> Result<EconomyConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            EconomyConfig::from_yaml_str(&text).with_context(|| format!("loading config {path}"))
        }
        None => Ok(EconomyConfig::default()),
    }
}

fn demo_barony(catalog: &Catalog, cfg: &EconomyConfig, tax_exempt: bool) -> Result<Barony> {
    let mut barony = Barony::new("Ravenmoor", tax_exempt, cfg);
    barony.add_member(PlayerCharacter::new("Ada", Role::Baron));
    barony.add_member(PlayerCharacter::new("Bram", Role::Steward));

    let roster = &mut barony.roster;
    roster.place_settlement(catalog, "Village", 1, "Ashford")?;
    roster.place_settlement(catalog, "City", 3, "Highmoor")?;
    roster.place_structure(catalog, "Sawmill", 1, "Ashford Sawmill", "Ashford")?;
    roster.place_structure(catalog, "Farm", 1, "Ashford Farm", "Ashford")?;
    roster.place_structure(catalog, "Markets", 1, "Highmoor Market", "Highmoor")?;
    roster.place_structure(catalog, "Towers", 2, "Highmoor Watch", "Highmoor")?;

    barony.roster.npcs.push(Npc {
        name: "Hal".into(),
        tier: NpcTier::Tier2,
        estate: Some(Estate {
            level: 1,
            upkeep: ResourceDelta::from([(Resource::Coin, 2)]),
        }),
    });
    let mut den = Homeward::new("Ada's Den", 1);
    den.assign_creature("Griffin", 4);
    den.assign_creature("Wyvern", 3);
    barony.roster.homewards.push(den);

    barony.road_upkeep = ResourceDelta::from([(Resource::Coin, 1)]);
    barony.ledger.account_mut().add(
        &ResourceDelta::from([(Resource::Coin, 30), (Resource::Food, 10), (Resource::Stone, 6)]),
        "founding treasury",
        "SYSTEM",
    );
    Ok(barony)
}

fn demo_plan() -> Vec<PlannedAction> {
    vec![
        PlannedAction {
            actor: ActorId::new(ActorKind::Character, "Ada"),
            action: ActionType::BuildRoad,
            details: "Ashford to Highmoor".into(),
            cost: Some(ResourceDelta::from([(Resource::Lumber, 6), (Resource::Coin, 4)])),
            turn_cost: 1,
            build: None,
        },
        PlannedAction {
            actor: ActorId::new(ActorKind::Character, "Bram"),
            action: ActionType::StartCaravan,
            details: "grain to the coast".into(),
            cost: Some(ResourceDelta::from([(Resource::Food, 8)])),
            turn_cost: 2,
            build: None,
        },
        PlannedAction {
            actor: ActorId::new(ActorKind::Settlement, "Highmoor"),
            action: ActionType::ResearchTechnology,
            details: "masonry".into(),
            cost: Some(ResourceDelta::from([(Resource::Stone, 4)])),
            turn_cost: 1,
            build: None,
        },
        PlannedAction {
            actor: ActorId::new(ActorKind::Settlement, "Highmoor"),
            action: ActionType::BuildStructure,
            details: String::new(),
            cost: None,
            turn_cost: 1,
            build: Some(BuildOrder {
                template: "Sawmill".into(),
                level: 1,
                name: "Highmoor Sawmill".into(),
            }),
        },
        PlannedAction {
            actor: ActorId::new(ActorKind::Settlement, "Highmoor"),
            action: ActionType::UpgradeSettlement,
            details: String::new(),
            cost: None,
            turn_cost: 1,
            build: None,
        },
        PlannedAction {
            actor: ActorId::new(ActorKind::Homeward, "Ada's Den"),
            action: ActionType::AssignCreature,
            details: "Griffin to patrol".into(),
            cost: None,
            turn_cost: 1,
            build: None,
        },
    ]
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let catalog = load_catalog(args.catalog.as_deref())?;
    let cfg = load_config(args.config.as_deref())?;
    let mut barony = demo_barony(&catalog, &cfg, args.tax_exempt)?;
    info!(
        barony = %barony.name,
        production = %barony.production(),
        upkeep = %barony.upkeep(),
        "demo barony founded"
    );

    let mut engine = TurnEngine::new(cfg, catalog);
    let mut handler = ScriptedActions::new(demo_plan());
    for month in 1..=args.months.unwrap_or(3) {
        let key = format!("{month:04}");
        let report = engine.run_tick(&mut barony, &key, &mut handler)?;
        for err in handler.rejected() {
            warn!(month = %key, %err, "action refused");
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let summary = barony.ledger.get_ledger_report();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
