use std::fs::File;
use std::sync::Arc;
use clap::Parser;
use log::info;
use serde::Serialize;
use multifab::distribution_mapping::Knapsack;
use multifab::message::{ChannelCommunicator, Communicator};
use multifab::{
    BoxArray,
    Config,
    DistributionMapping,
    IndexBox,
    IntVect,
    MFIter,
    MultiFab,
    Periodicity,
    Selection,
    Transfer,
};




#[derive(Debug, Parser)]
#[clap(version = "1.0", author = "J. Zrake <jzrake@clemson.edu>")]
struct Opts {
    #[clap(short = 'n', long, default_value = "4")]
    num_ranks: usize,

    #[clap(short = 'd', long, default_value = "64")]
    domain_size: i64,

    #[clap(short = 'm', long, default_value = "16")]
    max_grid_size: i64,

    #[clap(short = 't', long)]
    tile_size: Option<i64>,

    #[clap(short = 'p', long)]
    periodic: bool,

    #[clap(short = 'c', long)]
    config: Option<String>,

    #[clap(short = 'o', long, default_value = "multifab_demo.cbor")]
    output: String,
}




#[derive(Debug, Serialize)]
struct RankSummary {
    rank: usize,
    local_boxes: usize,
    local_tiles: usize,
    local_sum: f64,
}




#[derive(Debug, Serialize)]
struct Summary {
    config: Config,
    num_boxes: usize,
    sum: f64,
    sum_with_ghosts: f64,
    norm1: f64,
    norm2: f64,
    norminf: f64,
    max_index: Option<Vec<i64>>,
    nodal_norm1: f64,
    nodal_norm1_periodic: f64,
    ranks: Vec<RankSummary>,
}




// ============================================================================
fn config_from_opts(opts: &Opts) -> multifab::Result<Config> {
    let mut config = match &opts.config {
        Some(path) => {
            let file = File::open(path).map_err(|e| multifab::Error::InvalidArgument(e.to_string()))?;
            Config::from_reader(file)?
        }
        None => Config::default(),
    };
    config.num_ranks = opts.num_ranks;
    config.domain_size = opts.domain_size;
    config.max_grid_size = opts.max_grid_size;
    config.periodic |= opts.periodic;

    if let Some(n) = opts.tile_size {
        config.tile_size = vec![n; 2];
        config.do_tiling = true;
    }
    config.validate()?;
    Ok(config)
}




/**
 * Run the scenario on one rank. Every rank builds the same box array and
 * distribution mapping, so the layouts agree without any communication.
 */
fn run_rank(config: &Config, comm: Arc<dyn Communicator>) -> multifab::Result<(RankSummary, Summary)> {
    let n = config.domain_size;
    let domain = IndexBox::new([0, 0], [n - 1, n - 1]);
    let ba = BoxArray::from_domain(domain).max_size_all(config.max_grid_size)?;
    let dm = DistributionMapping::new(&ba, comm.size(), &Knapsack)?;
    let period = if config.periodic {
        Periodicity::from_domain(&domain, [true, true])
    } else {
        Periodicity::non_periodic()
    };
    let ngrow = IntVect::splat(config.num_ghost);

    if comm.rank() == 0 {
        info!("domain {} cut into {} boxes over {} ranks", domain, ba.len(), comm.size());
    }

    let mut mf = MultiFab::from_layout(ba.clone(), dm.clone(), 1, ngrow, comm.clone())?;
    let mut mfi = MFIter::with_info(&mf, config.mfiter_info()?)?;
    let local_tiles = mfi.length();

    while mfi.is_valid() {
        let tile = mfi.tilebox()?;
        let mut a = mf.array(&mfi)?;

        for p in tile.iter() {
            a[(p, 0)] = (p[0] + p[1]) as f64 / n as f64;
        }
        mfi.advance()?;
    }
    mf.fill_boundary(0, 1, &period)?;

    let valid = Selection::default();
    let ghosts = Selection::default().with_ghost(ngrow);
    let local_sum = mf.sum(&valid, true)?;

    let mut nodes = MultiFab::from_layout(ba.surrounding_nodes(), dm, 1, IntVect::zero(), comm.clone())?;
    nodes.set_val_all(1.0);
    nodes.override_sync(0, 1, &period)?;

    let mut twice = MultiFab::like(&mf, 1, IntVect::zero())?;
    MultiFab::copy(&mut twice, &mf, &Transfer::default())?;
    MultiFab::add(&mut twice, &mf, &Transfer::default())?;

    let summary = Summary {
        config: config.clone(),
        num_boxes: ba.len(),
        sum: mf.sum(&valid, false)?,
        sum_with_ghosts: mf.sum(&ghosts, false)?,
        norm1: twice.norm1(&valid, false)?,
        norm2: twice.norm2(&valid, false)?,
        norminf: twice.norminf(&valid, false)?,
        max_index: mf.max_index(0, false)?.map(Vec::from),
        nodal_norm1: nodes.norm1(&valid, false)?,
        nodal_norm1_periodic: nodes.norm1_periodic(0, &period, false)?,
        ranks: Vec::new(),
    };

    let rank_summary = RankSummary {
        rank: comm.rank(),
        local_boxes: mf.base().local_size()?,
        local_tiles,
        local_sum,
    };
    info!("[{}] {} boxes, {} tiles, local sum {}", rank_summary.rank, rank_summary.local_boxes, local_tiles, local_sum);
    Ok((rank_summary, summary))
}




// ============================================================================
fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Info).init()?;

    let opts = Opts::parse();
    let config = config_from_opts(&opts)?;
    info!("{:?}", config);

    let start = std::time::Instant::now();
    let config_ref = &config;

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = ChannelCommunicator::group(config.num_ranks)
            .into_iter()
            .map(|comm| scope.spawn(move || run_rank(config_ref, Arc::new(comm))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(multifab::Error::CommunicationFailure("rank thread panicked".into()))))
            .collect()
    });

    let mut ranks = Vec::new();
    let mut global = None;

    for result in results {
        let (rank_summary, summary) = result?;
        ranks.push(rank_summary);
        global.get_or_insert(summary);
    }
    let mut summary = global.ok_or("no ranks were run")?;
    summary.ranks = ranks;

    info!("sum ................... {}", summary.sum);
    info!("sum with ghosts ....... {}", summary.sum_with_ghosts);
    info!("norm1 (2x) ............ {}", summary.norm1);
    info!("nodal norm1 ........... {} ({} counting shared nodes once)", summary.nodal_norm1, summary.nodal_norm1_periodic);
    info!("elapsed ............... {:.3}s", start.elapsed().as_secs_f64());

    let mut buffer = Vec::new();
    ciborium::ser::into_writer(&summary, &mut buffer)?;
    std::fs::write(&opts.output, buffer)?;
    info!("wrote {}", opts.output);
    Ok(())
}
