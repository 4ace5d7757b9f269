use anyhow::{anyhow, Context, Result};
use clap::Parser;
use liquidstake_execution::{
    get_snapshot, list_validator_states, run_rebalance_cycle, stake_in, stake_out, update_validator_weights,
    ExecutionContext,
};
use liquidstake_ledger::{InMemoryLedger, DEFAULT_BOND_DENOM};
use liquidstake_storage::Storage;
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::{Address, BankLedger, StakingLedger};
use liquidstake_types::params::Params;
use liquidstake_types::state::{NetAmountState, PoolState};
use liquidstake_types::validator::{ValidatorId, WeightEntry};
use liquidstake_types::Amount;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

const SELF_BOND: Amount = 1_000_000;
const VALIDATOR_WEIGHT: u128 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Liquid staking pool simulation runner")]
struct Args {
    /// Validators created on the ledger. The last one joins the allow-list
    /// a third of the way through.
    #[arg(long, default_value_t = 5)]
    validators: usize,
    /// Accounts that stake and unstake at random.
    #[arg(long, default_value_t = 50)]
    stakers: usize,
    /// Rebalance cycles to run.
    #[arg(long, default_value_t = 30)]
    epochs: u64,
    /// Base asset airdropped to each staker.
    #[arg(long, default_value_t = 1_000_000)]
    simulation_money: u64,
    /// Ledger time between two cycles, in seconds.
    #[arg(long, default_value_t = 86_400)]
    epoch_seconds: u64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// JSON file with pool parameters; defaults apply to missing fields.
    #[arg(long)]
    params: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Summary {
    stakes: u64,
    unstakes: u64,
    failed: u64,
    redelegations: u64,
    tombstoned: Option<ValidatorId>,
    snapshot: NetAmountState,
    state_root: [u8; 32],
}

struct Simulation {
    state: PoolState,
    ledger: InMemoryLedger,
    storage: Storage,
    validators: Vec<ValidatorId>,
    stakers: Vec<Address>,
    height: u64,
}

impl Simulation {
    fn ctx(&mut self) -> ExecutionContext<'_, InMemoryLedger> {
        let timestamp = self.ledger.now();
        ExecutionContext {
            state: &mut self.state,
            ledger: &mut self.ledger,
            height: self.height,
            timestamp,
        }
    }

    fn receipt_balance(&self, who: &Address) -> Amount {
        self.ledger.balance(who, &self.state.params.liquid_bond_denom)
    }
}

fn load_params(path: Option<&PathBuf>) -> Result<Params> {
    let params = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Params>(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Params::default(),
    };
    params.validate().map_err(|e| anyhow!("invalid params: {}", e))?;
    Ok(params)
}

fn build_validators(count: usize) -> Vec<ValidatorId> {
    (0..count)
        .map(|i| ValidatorId::from(format!("validator-{}", i).as_str()))
        .collect()
}

fn build_stakers(count: usize) -> Vec<Address> {
    (0..count)
        .map(|i| {
            let mut address = [0u8; 32];
            address[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
            address
        })
        .collect()
}

fn weights(validators: &[ValidatorId]) -> Vec<WeightEntry> {
    validators
        .iter()
        .map(|v| WeightEntry::new(v.clone(), VALIDATOR_WEIGHT))
        .collect()
}

fn bootstrap(args: &Args, params: Params) -> Result<Simulation> {
    if args.validators == 0 || args.stakers == 0 {
        return Err(anyhow!("need at least one validator and one staker"));
    }
    let mut ledger = InMemoryLedger::default();
    let validators = build_validators(args.validators);
    for v in &validators {
        ledger.add_validator(v.clone(), SELF_BOND)?;
    }
    let stakers = build_stakers(args.stakers);
    for s in &stakers {
        ledger.mint(s, DEFAULT_BOND_DENOM, args.simulation_money as Amount)?;
    }

    let mut sim = Simulation {
        state: PoolState::new(params),
        ledger,
        storage: Storage::in_memory(),
        validators,
        stakers,
        height: 0,
    };
    let initial = weights(&sim.validators[..sim.validators.len().max(2) - 1]);
    update_validator_weights(&mut sim.ctx(), initial)?;
    sim.storage.commit_pool(&sim.state)?;
    Ok(sim)
}

fn random_staking(sim: &mut Simulation, rng: &mut StdRng, args: &Args, summary: &mut Summary) {
    let actions = (sim.stakers.len() / 5).max(1);
    for _ in 0..actions {
        let who = sim.stakers[rng.gen_range(0..sim.stakers.len())];
        let result = if rng.gen_bool(0.6) {
            let amount = rng.gen_range(1_000..=(args.simulation_money as Amount / 10).max(1_000));
            stake_in(&mut sim.ctx(), &who, amount).map(|_| summary.stakes += 1)
        } else {
            let held = sim.receipt_balance(&who);
            let amount = if held == 0 { 0 } else { rng.gen_range(1..=held) };
            stake_out(&mut sim.ctx(), &who, amount).map(|_| summary.unstakes += 1)
        };
        if let Err(e) = result {
            debug!(error = %e, "staking action rejected");
            summary.failed += 1;
        }
    }
}

fn random_ledger_events(sim: &mut Simulation, rng: &mut StdRng) -> Result<()> {
    for v in sim.validators.clone() {
        let accepts = sim.ledger.validator(&v).map(|i| i.accepts_stake()).unwrap_or(false);
        if !accepts {
            if rng.gen_bool(0.3) {
                sim.ledger.unjail(&v)?;
            }
            continue;
        }
        sim.ledger.accrue_rewards(&v, rng.gen_range(0..=2_000))?;
        if rng.gen_bool(0.02) {
            info!(validator = %v, "jailing validator");
            sim.ledger.jail(&v)?;
        }
    }
    Ok(())
}

fn simulate(args: &Args) -> Result<Summary> {
    let params = load_params(args.params.as_ref())?;
    let mut sim = bootstrap(args, params)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut summary = Summary::default();

    for epoch in 1..=args.epochs {
        sim.height = epoch;
        random_staking(&mut sim, &mut rng, args, &mut summary);
        random_ledger_events(&mut sim, &mut rng)?;

        if epoch == args.epochs / 3 {
            let all = weights(&sim.validators);
            update_validator_weights(&mut sim.ctx(), all)?;
        }
        if epoch == args.epochs / 2 && summary.tombstoned.is_none() {
            let victim = sim.validators[rng.gen_range(0..sim.validators.len())].clone();
            let burned = sim.ledger.tombstone(&victim, Dec::from_raw(50_000_000_000_000_000))?;
            info!(validator = %victim, burned, "tombstoned validator");
            summary.tombstoned = Some(victim);
        }

        let moves = run_rebalance_cycle(&mut sim.ctx())?;
        summary.redelegations += moves.len() as u64;

        sim.ledger.advance_time(args.epoch_seconds)?;
        sim.storage.commit_pool(&sim.state)?;
        sim.storage.save_state_at_height(epoch, &sim.state)?;
    }

    let supply = sim.ledger.supply(&sim.state.params.liquid_bond_denom);
    let held: Amount = sim.stakers.iter().map(|s| sim.receipt_balance(s)).sum();
    if held != supply {
        return Err(anyhow!("receipt supply {} does not match holdings {}", supply, held));
    }
    let restored = sim.storage.load_state()?;
    if restored != sim.state {
        return Err(anyhow!("stored pool state diverged from memory"));
    }

    summary.snapshot = get_snapshot(&sim.ctx())?;
    summary.state_root = sim.state.root_hash();
    for state in list_validator_states(&sim.ctx())? {
        info!(
            validator = %state.operator,
            status = ?state.status,
            weight = state.weight,
            liquid_tokens = state.liquid_tokens,
            "final validator state"
        );
    }
    Ok(summary)
}

fn run_simulation(args: &Args) -> Result<()> {
    let start = Instant::now();
    let summary = simulate(args)?;
    let elapsed = start.elapsed();
    let nas = &summary.snapshot;

    println!("=== Liquid staking simulation ===");
    println!("Validators: {}", args.validators);
    println!("Stakers: {}", args.stakers);
    println!("Epochs: {}", args.epochs);
    println!("Stake-ins: {}", summary.stakes);
    println!("Stake-outs: {}", summary.unstakes);
    println!("Rejected actions: {}", summary.failed);
    println!("Redelegations: {}", summary.redelegations);
    if let Some(v) = &summary.tombstoned {
        println!("Tombstoned: {}", v);
    }
    println!("Receipt supply: {}", nas.receipt_total_supply);
    println!("Net amount: {}", nas.net_amount);
    println!("Mint rate: {}", nas.mint_rate);
    println!("Exchange rate: {}", nas.exchange_rate);
    println!("Liquid tokens: {}", nas.total_liquid_tokens);
    println!("Unbonding: {}", nas.total_unbonding_balance);
    println!("State root: {}", hex::encode(summary.state_root));
    println!("Elapsed: {:.2?}", elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    run_simulation(&args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(seed: u64) -> Args {
        Args {
            validators: 4,
            stakers: 10,
            epochs: 12,
            simulation_money: 100_000,
            epoch_seconds: 86_400,
            seed,
            params: None,
            verbose: false,
        }
    }

    #[test]
    fn simulation_bootstraps_allow_list() {
        let sim = bootstrap(&args(1), Params::default()).unwrap();
        assert_eq!(sim.validators.len(), 4);
        assert_eq!(sim.state.params.whitelisted_validators.len(), 3);
        assert_eq!(sim.state.liquid_validators.len(), 3);
        assert_eq!(sim.ledger.balance(&sim.stakers[0], DEFAULT_BOND_DENOM), 100_000);
        assert_eq!(sim.storage.load_state().unwrap(), sim.state);
    }

    #[test]
    fn simulation_is_deterministic() {
        let first = simulate(&args(7)).unwrap();
        let second = simulate(&args(7)).unwrap();
        assert_eq!(first, second);
        assert!(first.stakes > 0);
        assert!(first.tombstoned.is_some());
    }
}
