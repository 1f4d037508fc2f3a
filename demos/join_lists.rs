use std::path::PathBuf;

use clap::Parser;
use log::info;

use smg_rs::join::SmgJoin;
use smg_rs::options::SmgOptions;
use smg_rs::state::SmgState;
use smg_rs::types::ValueId;

#[derive(Debug, Parser)]
#[command(author, version, about = "Join the memory graphs of two singly-linked lists")]
struct Cli {
    /// Length of the first list.
    #[arg(value_name = "INT", default_value = "2")]
    len1: usize,

    /// Length of the second list.
    #[arg(value_name = "INT", default_value = "2")]
    len2: usize,

    /// Data stored in the nodes of the first list (unknown if omitted).
    #[arg(long, value_name = "INT")]
    data1: Option<i64>,

    /// Data stored in the nodes of the second list (unknown if omitted).
    #[arg(long, value_name = "INT")]
    data2: Option<i64>,

    /// Disable list-segment folding during join.
    #[clap(long)]
    no_abstraction: bool,

    /// Re-check graph invariants while joining.
    #[clap(long)]
    checks: bool,

    /// Write the joined graph in DOT format to this file.
    #[clap(long, value_name = "FILE")]
    dot: Option<PathBuf>,
}

/// Simulates `head = NULL; repeat len times { n = malloc(16); n->data = data; n->next = head; head = n; }`.
fn build_list(len: usize, data: Option<i64>) -> color_eyre::Result<SmgState> {
    let mut state = SmgState::default();
    state.push_stack_frame("main");
    let head = state.add_local_variable("head", 64)?;
    state.write_value(head, 0, 64, ValueId::ZERO)?;

    for _ in 0..len {
        let node = state.malloc(128, "node")?;
        let (object, _) = state
            .dereference(node)
            .ok_or_else(|| color_eyre::eyre::eyre!("malloc returned a non-pointer"))?;
        let value = ValueId::fresh();
        if let Some(n) = data {
            state.assign_explicit(value, n);
        }
        state.write_value(object, 0, 64, value)?;
        let next = state.read_value(head, 0, 64)?;
        state.write_value(object, 64, 64, next)?;
        state.write_value(head, 0, 64, node)?;
    }
    Ok(state)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let options = SmgOptions::default()
        .with_heap_abstraction(!args.no_abstraction)
        .with_perform_checks(args.checks);

    let state1 = build_list(args.len1, args.data1)?;
    let state2 = build_list(args.len2, args.data2)?;
    println!("state1 = {}", state1);
    println!("state2 = {}", state2);

    let result = SmgJoin::new(&options).run(state1.smg(), state2.smg())?;
    info!("join status: {}", result.status());

    match result.destination() {
        Some(dest) => {
            println!("Join defined with status {}", result.status());
            print!("{}", dest.debug_string());
            if let Some(path) = &args.dot {
                std::fs::write(path, dest.to_dot("join", "join_lists")?)?;
                println!("DOT written to {}", path.display());
            }
        }
        None => println!("Join undefined"),
    }

    println!(
        "state1 <= state2: {}",
        state1.is_less_or_equal(&state2, &options)?
    );
    println!(
        "state2 <= state1: {}",
        state2.is_less_or_equal(&state1, &options)?
    );

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
