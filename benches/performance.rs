//! Performance benchmarks for the hot paths of a probe session

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use network_probe::{
    cli::Cli,
    config::ConfigParser,
    dns::StaticResolver,
    probe::{icmp::packet, ProbeStrategy, StrategyFactory},
    stats::{calculate_percentile, StatsAggregator},
    types::ProbeKind,
    DispatchMode, ProbeConfig, ProbeEngine, ProbeResult, ProbeTarget,
};
use network_probe::logging::ProbeLogger;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

fn target(port: u16) -> ProbeTarget {
    ProbeTarget::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), Some(port))
}

/// Mix of successes and timeouts with spread-out latencies
fn create_sample_results(count: usize) -> Vec<ProbeResult> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let t = target(80);
            if i % 10 == 0 {
                ProbeResult::timeout(&t, i as u32, now, Duration::from_secs(1))
            } else {
                ProbeResult::success(&t, i as u32, now, Duration::from_micros(500 + (i as u64 * 37) % 20_000))
            }
        })
        .collect()
}

struct InstantProbe;

#[async_trait]
impl ProbeStrategy for InstantProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::TcpConnect
    }

    async fn execute(&self, target: &ProbeTarget, sequence: u32) -> ProbeResult {
        ProbeResult::success(target, sequence, Utc::now(), Duration::from_micros(100))
    }
}

struct InstantFactory;

#[async_trait]
impl StrategyFactory for InstantFactory {
    async fn create(
        &self,
        _config: &ProbeConfig,
        _logger: &ProbeLogger,
    ) -> network_probe::Result<Arc<dyn ProbeStrategy>> {
        Ok(Arc::new(InstantProbe))
    }
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    group.bench_function("parse_cli_args", |b| {
        b.iter(|| {
            black_box(Cli::parse_from([
                "nprobe", "--count", "10", "--parallel", "--max-in-flight", "32", "nmap", "10.0.0.1", "--to", "1024",
            ]))
        })
    });

    group.bench_function("build_probe_config", |b| {
        let cli = Cli::parse_from(["nprobe", "--count", "10", "--parallel", "nmap", "10.0.0.1", "--to", "1024"]);
        b.iter(|| {
            let config = ConfigParser::new(cli.clone()).with_env_file(None).parse().unwrap();
            black_box(config.probe_config().unwrap())
        })
    });

    group.finish();
}

fn benchmark_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [100usize, 10_000, 100_000].iter() {
        let results = create_sample_results(*size);
        group.bench_with_input(BenchmarkId::new("aggregate", size), size, |b, &size| {
            b.iter(|| black_box(StatsAggregator::new(size as u64).aggregate(&results)))
        });

        let mut sorted: Vec<u128> = results.iter().map(|r| r.latency.as_micros()).collect();
        sorted.sort_unstable();
        group.bench_with_input(BenchmarkId::new("percentiles", size), size, |b, _| {
            b.iter(|| {
                black_box((
                    calculate_percentile(&sorted, 50.0),
                    calculate_percentile(&sorted, 95.0),
                    calculate_percentile(&sorted, 99.0),
                ))
            })
        });
    }

    group.finish();
}

fn benchmark_icmp_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("icmp_framing");
    let payload = packet::payload(56);

    group.bench_function("encode_request", |b| {
        b.iter(|| black_box(packet::encode_request(0x1234, black_box(42), &payload)))
    });

    let reply = packet::reply_for(&packet::encode_request(0x1234, 42, &payload));
    group.bench_function("parse_reply", |b| b.iter(|| black_box(packet::parse(black_box(&reply)))));

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.sample_size(10);

    let runtime = tokio::runtime::Runtime::new().unwrap();

    for mode in [DispatchMode::Sequential, DispatchMode::Parallel] {
        group.bench_function(format!("{:?}_1000_ops", mode).to_lowercase(), |b| {
            b.iter(|| {
                let config = ProbeConfig::nmap("bench.test", 1, 1000)
                    .with_delay(Duration::ZERO)
                    .with_dispatch(mode, 64);
                let engine = ProbeEngine::new(config)
                    .with_resolver(Arc::new(
                        StaticResolver::new().with_host("bench.test", vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]),
                    ))
                    .with_strategy_factory(Arc::new(InstantFactory));
                black_box(runtime.block_on(engine.run()).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_config_parsing,
    benchmark_statistics,
    benchmark_icmp_framing,
    benchmark_dispatch
);
criterion_main!(benches);
