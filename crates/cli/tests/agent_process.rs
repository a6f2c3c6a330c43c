use std::{
    process::Stdio,
    time::Duration,
};

use hashrate_sim::prelude::*;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
};

const AGENT: &str = env!("CARGO_BIN_EXE_mining-agent");

fn spawn_agent(hashrate: &str, threshold: &str) -> Child {
    Command::new(AGENT)
        .args(["--name", "majority"])
        .args(["--hashrate", hashrate])
        .args(["--hash-threshold", threshold])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("agent executable should spawn")
}

/// Writes `input` to the agent, then collects its output for `duration`.
async fn collect_output(
    child: &mut Child,
    input: &[u8],
    duration: Duration,
) -> Vec<AgentLine> {
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(input).await.unwrap();
    stdin.flush().await.unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let mut output = vec![];
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            line = lines.next_line() => match line.unwrap() {
                Some(line) => output.push(AgentLine::parse(&line)),
                None => break,
            },
            _ = &mut deadline => break,
        }
    }

    // keep stdin open until here, closing it early would look like EOF
    drop(stdin);
    output
}

fn events(output: &[AgentLine]) -> Vec<&Event> {
    output
        .iter()
        .filter_map(|line| match line {
            AgentLine::Event(event) => Some(event),
            AgentLine::Text(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn every_hash_finds_a_block_with_max_threshold() {
    let mut child = spawn_agent("2000", "FFFFFFFF");
    let output = collect_output(
        &mut child,
        b"hello\nSTART\n",
        Duration::from_millis(2500),
    )
    .await;
    child.kill().await.unwrap();

    match &output[0] {
        AgentLine::Text(banner) => {
            assert!(banner.starts_with("Starting mining agent majority"))
        }
        other => panic!("expected banner, got {:?}", other),
    }
    assert!(output.contains(&AgentLine::Text("hello".into())));

    let events = events(&output);
    let mut blocks_seen = 0;
    let mut statistics_seen = 0;
    for event in events {
        assert_eq!(event.source(), "majority");
        match event {
            Event::BlockFound { .. } => blocks_seen += 1,
            Event::Statistics { payload, .. } => {
                statistics_seen += 1;
                // stream order is emission order
                assert_eq!(payload.block_count, blocks_seen);
                assert!(payload.hashrate_s > 0.0);
            }
        }
    }

    assert!(statistics_seen >= 1);
    assert!(blocks_seen > 0);
}

#[tokio::test]
async fn zero_threshold_never_finds_a_block() {
    let mut child = spawn_agent("5000", "00000000");
    let output = collect_output(
        &mut child,
        b"START\n",
        Duration::from_millis(2500),
    )
    .await;
    child.kill().await.unwrap();

    let events = events(&output);
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::BlockFound { .. })));

    let statistics: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Statistics { payload, .. } => Some(payload),
            _ => None,
        })
        .collect();
    assert!(!statistics.is_empty());
    for payload in statistics {
        assert_eq!(payload.block_count, 0);
        assert!(payload.hashrate_s > 0.0);
    }
}

#[tokio::test]
async fn waits_for_start_and_exits_on_closed_input() {
    let mut child = spawn_agent("1000", "FFFFFFFF");
    let output = collect_output(
        &mut child,
        b"not yet\n",
        Duration::from_millis(500),
    )
    .await;

    assert!(events(&output).is_empty());

    // stdin was dropped by collect_output
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("agent should exit once its input closes")
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn controller_races_two_agents() {
    let config = ControllerConfig {
        majority_fraction: 0.75,
        total_hashrate: 400,
        hash_threshold: HashThreshold::MAX,
        warmup: Duration::from_millis(200),
        duration: Some(Duration::from_millis(1500)),
    };
    let controller =
        Controller::new(config, AgentCommand::new(AGENT)).unwrap();

    let mut out = Vec::new();
    let tally = controller.run(&mut out).await.unwrap();

    let majority = tally.block_count("majority");
    let minority = tally.block_count("minority");
    assert!(minority > 0);
    assert!(majority > minority);
    assert_eq!(controller.phase(), Phase::Done);

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Starting mining agent majority"));
    assert!(out.contains("Starting simulation now."));
    assert!(out.contains("Majority"));
}

#[tokio::test]
async fn closed_output_is_a_clean_exit() {
    let mut child = spawn_agent("1000", "FFFFFFFF");
    drop(child.stdout.take());

    // the agent may already have exited
    let mut stdin = child.stdin.take().unwrap();
    let _ = stdin.write_all(b"hello\nSTART\n").await;
    let _ = stdin.flush().await;

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("agent should exit once its output closes")
        .unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn interrupt_stops_a_running_agent() {
    let mut child = spawn_agent("2000", "FFFFFFFF");
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"START\n").await.unwrap();
    stdin.flush().await.unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let mut output = vec![];
    while let Some(line) = lines.next_line().await.unwrap() {
        let line = AgentLine::parse(&line);
        let mining = matches!(line, AgentLine::Event(_));
        output.push(line);
        if mining {
            break;
        }
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let pid = child.id().unwrap().to_string();
    let kill = Command::new("kill")
        .args(["-INT", &pid])
        .status()
        .await
        .unwrap();
    assert!(kill.success());

    let rest = async {
        while let Some(line) = lines.next_line().await.unwrap() {
            output.push(AgentLine::parse(&line));
        }
    };
    tokio::time::timeout(Duration::from_secs(10), rest)
        .await
        .expect("agent output should close after the interrupt");

    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .expect("agent should exit after the interrupt")
        .unwrap();
    assert!(status.success());
    drop(stdin);

    // banner, then the blank line printed on start
    assert!(matches!(&output[0], AgentLine::Text(_)));
    assert_eq!(output[1], AgentLine::Text(String::new()));
    assert!(output.len() > 2);
    assert!(output[2..]
        .iter()
        .all(|line| matches!(line, AgentLine::Event(_))));
}

/// Number of live processes running the executable at `program`.
#[cfg(target_os = "linux")]
fn running_copies(program: &std::path::Path) -> usize {
    std::fs::read_dir("/proc")
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            std::fs::read_link(entry.path().join("exe"))
                .map_or(false, |exe| exe == program)
        })
        .count()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn cancelled_run_kills_every_agent() {
    // a private copy, so only this test's agents are counted
    let agent = std::env::temp_dir()
        .join(format!("mining-agent-cancel-{}", std::process::id()));
    std::fs::copy(AGENT, &agent).unwrap();
    let agent = std::fs::canonicalize(&agent).unwrap();

    let config = ControllerConfig {
        total_hashrate: 200,
        warmup: Duration::from_millis(100),
        duration: None,
        ..Default::default()
    };
    let controller =
        Controller::new(config, AgentCommand::new(&agent)).unwrap();
    let mut phases = controller.subscribe();

    {
        let run = controller.run(Vec::new());
        tokio::pin!(run);

        tokio::select! {
            _ = &mut run => panic!("run ended before the agents started"),
            running = phases.wait_for(|phase| *phase == Phase::Running) => {
                running.unwrap();
            }
        }
        assert_eq!(running_copies(&agent), 2);

        let mined =
            tokio::time::timeout(Duration::from_millis(500), &mut run).await;
        assert!(mined.is_err(), "run without a duration should not end");
    }

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while running_copies(&agent) > 0 {
        let now = std::time::Instant::now();
        assert!(now < deadline, "agents outlived their run");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(controller.phase(), Phase::Running);

    std::fs::remove_file(&agent).unwrap();
}
