use crate::reports;
use clap::Args;
use serde_json::json;
use spux_core::balancer::{Adaptive, Balancer};
use spux_core::consts::DEFAULT_WORKERS;
use spux_core::error::{SpuxError, SpuxResult};
use spux_core::{Ensemble, ParticleIndex};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct BalanceArgs {
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Initial particles, indexed 0..particles.
    #[arg(long, default_value_t = 8)]
    pub particles: usize,

    /// Current ensembles as JSON, e.g. '[[5],[6]]'. Overrides --workers and
    /// --particles.
    #[arg(long)]
    pub ensembles: Option<String>,

    /// Comma-separated surviving indices, clones repeated. Drawn uniformly
    /// when omitted.
    #[arg(long)]
    pub survivors: Option<String>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Print one JSON document instead of tables.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

fn parse_survivors(list: &str) -> SpuxResult<Vec<ParticleIndex>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| SpuxError::Validation(format!("bad particle index '{}'", s)))
        })
        .collect()
}

pub fn run(args: BalanceArgs) -> SpuxResult<()> {
    let ensembles: Vec<Ensemble> = match &args.ensembles {
        Some(document) => serde_json::from_str(document)?,
        None => {
            let indices: Vec<ParticleIndex> = (0..args.particles).collect();
            Adaptive.ensembles(&indices, args.workers)?
        }
    };
    let held: Vec<ParticleIndex> = ensembles.concat();

    let survivors = match &args.survivors {
        Some(list) => parse_survivors(list)?,
        None => {
            let mut rng = fastrand::Rng::with_seed(args.seed);
            (0..held.len()).map(|_| held[rng.usize(0..held.len())]).collect()
        }
    };
    info!(
        "Balancing {} survivors of {} particles over {} workers",
        survivors.len(),
        held.len(),
        ensembles.len()
    );

    let (next, routings) = Adaptive.routings(&ensembles, &survivors)?;
    let traffic = Adaptive.traffic(&routings);
    let sources = Adaptive.sources(&routings)?;

    if args.json {
        let document = json!({
            "ensembles": ensembles,
            "routings": routings,
            "next": next,
            "traffic": traffic,
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    reports::print_ensembles("Before", &ensembles);
    reports::print_routings(&routings);
    reports::print_ensembles("After", &next);
    reports::print_traffic(&[(0, traffic)]);
    println!("Sources: {:?}", sources);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survivor_list_tolerates_spaces() {
        assert_eq!(parse_survivors("0, 0,3 ,6").unwrap(), vec![0, 0, 3, 6]);
        assert!(parse_survivors("").unwrap().is_empty());
    }

    #[test]
    fn survivor_list_rejects_garbage() {
        assert!(parse_survivors("1,x").is_err());
    }
}
