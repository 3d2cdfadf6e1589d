//! Route optimization over the cross-chain liquidity graph.
//!
//! The graph is rebuilt per query from static connectivity rules, searched
//! for k-shortest simple paths by cumulative fee rate, simulated hop by hop,
//! and scored with privacy-level-dependent weights.

use crate::crypto::generate_route_id;
use crate::error::{Error, Result};
use crate::types::{
    Asset, Chain, FeeBreakdown, PrivacyLevel, Route, RouteHop, SwapIntent, SwapMechanism,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Privacy score below which a route does not qualify as private.
const PRIVATE_ROUTE_THRESHOLD: f64 = 70.0;

/// One directed liquidity edge between two chains.
#[derive(Debug, Clone)]
struct GraphEdge {
    from: Chain,
    to: Chain,
    mechanism: SwapMechanism,
    venue: &'static str,
    fee_rate: Decimal,
    time_secs: u64,
    liquidity: u128,
}

/// Sub-score weights applied during route ranking.
///
/// Output, fee, and time split the non-privacy weight 0.5/0.4/0.1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub privacy: f64,
    pub output: f64,
    pub fee: f64,
    pub time: f64,
}

impl ScoreWeights {
    pub fn for_level(level: PrivacyLevel) -> Self {
        let privacy = level.privacy_weight();
        let rest = 1.0 - privacy;
        Self {
            privacy,
            output: rest * 0.5,
            fee: rest * 0.4,
            time: rest * 0.1,
        }
    }
}

/// Finds and ranks candidate routes for an intent.
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    /// Simple paths considered per query.
    max_paths: usize,
    /// Routes returned to the caller.
    max_routes: usize,
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self {
            max_paths: 5,
            max_routes: 3,
        }
    }
}

impl RouteOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top routes for the intent, sorted by score descending.
    pub fn find_routes(&self, intent: &SwapIntent) -> Result<Vec<Route>> {
        let from = intent.source.chain;
        let to = intent.dest.chain;
        let edges = build_graph();
        let paths = k_shortest_paths(&edges, from, to, self.max_paths);
        if paths.is_empty() {
            return Err(Error::NoRouteFound { from, to });
        }

        let weights = ScoreWeights::for_level(intent.privacy_level);
        let mut routes: Vec<Route> = paths
            .into_iter()
            .map(|path| simulate_route(intent, &path, weights))
            .collect();
        routes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        routes.truncate(self.max_routes);

        log::debug!(
            "found {} route(s) {} -> {}, best score {:.4}",
            routes.len(),
            from,
            to,
            routes.first().map(|r| r.score).unwrap_or_default()
        );
        Ok(routes)
    }

    /// Best route with a privacy score of at least 70.
    pub fn find_private_route(&self, intent: &SwapIntent) -> Result<Route> {
        self.find_routes(intent)?
            .into_iter()
            .find(|route| route.privacy_score >= PRIVATE_ROUTE_THRESHOLD)
            .ok_or(Error::NoPrivateRoute)
    }
}

/// Native asset symbol used for intermediate hops.
fn native_asset(chain: Chain) -> String {
    Asset::native(chain).symbol
}

/// Build the full edge set from static connectivity rules.
///
/// Every ordered pair gets an HTLC edge, EVM pairs add a bridge, and any
/// pair touching Cosmos adds IBC. Hub routing through Osmosis falls out of
/// the pairwise edges during path search.
fn build_graph() -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for from in Chain::ALL {
        for to in Chain::ALL {
            if from == to {
                continue;
            }
            edges.push(GraphEdge {
                from,
                to,
                mechanism: SwapMechanism::AtomicSwap,
                venue: "omniswap-htlc",
                fee_rate: dec!(0.003),
                time_secs: 1200,
                liquidity: 1_000_000_000_000,
            });
            if from.is_evm() && to.is_evm() {
                edges.push(GraphEdge {
                    from,
                    to,
                    mechanism: SwapMechanism::Bridge,
                    venue: "thorchain",
                    fee_rate: dec!(0.005),
                    time_secs: 600,
                    liquidity: 500_000_000_000,
                });
            }
            if from.is_cosmos() || to.is_cosmos() {
                edges.push(GraphEdge {
                    from,
                    to,
                    mechanism: SwapMechanism::IbcTransfer,
                    venue: "ibc",
                    fee_rate: dec!(0.001),
                    time_secs: 60,
                    liquidity: 10_000_000_000_000,
                });
            }
        }
    }
    edges
}

/// Enumerate simple paths from `from` to `to` and keep the `k` cheapest by
/// cumulative fee rate. The visited set guarantees no cycles.
fn k_shortest_paths(
    edges: &[GraphEdge],
    from: Chain,
    to: Chain,
    k: usize,
) -> Vec<Vec<GraphEdge>> {
    // Two intermediate chains is plenty on a six-chain graph.
    const MAX_HOPS: usize = 3;

    let mut by_source: HashMap<Chain, Vec<&GraphEdge>> = HashMap::new();
    for edge in edges {
        by_source.entry(edge.from).or_default().push(edge);
    }

    let mut found: Vec<(Decimal, Vec<GraphEdge>)> = Vec::new();
    let mut path: Vec<GraphEdge> = Vec::new();
    let mut visited = vec![from];

    fn walk(
        at: Chain,
        to: Chain,
        by_source: &HashMap<Chain, Vec<&GraphEdge>>,
        visited: &mut Vec<Chain>,
        path: &mut Vec<GraphEdge>,
        found: &mut Vec<(Decimal, Vec<GraphEdge>)>,
        max_hops: usize,
    ) {
        if at == to && !path.is_empty() {
            let cost: Decimal = path.iter().map(|e| e.fee_rate).sum();
            found.push((cost, path.clone()));
            return;
        }
        if path.len() >= max_hops {
            return;
        }
        let Some(outgoing) = by_source.get(&at) else {
            return;
        };
        for edge in outgoing {
            if visited.contains(&edge.to) {
                continue;
            }
            visited.push(edge.to);
            path.push((*edge).clone());
            walk(edge.to, to, by_source, visited, path, found, max_hops);
            path.pop();
            visited.pop();
        }
    }

    walk(from, to, &by_source, &mut visited, &mut path, &mut found, MAX_HOPS);
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.truncate(k);
    found.into_iter().map(|(_, path)| path).collect()
}

/// Thread the source amount through a path and score the result.
fn simulate_route(intent: &SwapIntent, path: &[GraphEdge], weights: ScoreWeights) -> Route {
    let input = intent.source.amount;
    let mut amount = input;
    let mut total_fees: u128 = 0;
    let mut total_time: u64 = 0;
    let mut hops = Vec::with_capacity(path.len());
    let last = path.len() - 1;

    for (i, edge) in path.iter().enumerate() {
        let fee = fee_floor(amount, edge.fee_rate);
        let output = amount.saturating_sub(fee);
        hops.push(RouteHop {
            from_chain: edge.from,
            to_chain: edge.to,
            from_asset: if i == 0 {
                intent.source.asset.clone()
            } else {
                native_asset(edge.from)
            },
            to_asset: if i == last {
                intent.dest.asset.clone()
            } else {
                native_asset(edge.to)
            },
            mechanism: edge.mechanism,
            venue: edge.venue.to_string(),
            estimated_output: output,
            fee,
        });
        total_fees += fee;
        total_time += edge.time_secs;
        amount = output;
    }

    let protocol_fee = total_fees / 3;
    let estimated_fees = FeeBreakdown {
        protocol_fee,
        network_fees: HashMap::new(),
        solver_fee: total_fees - protocol_fee,
        total: total_fees,
    };

    let privacy_score = privacy_score(path);
    let slippage_risk = path
        .iter()
        .map(|edge| match edge.mechanism {
            SwapMechanism::AmmSwap => 0.02,
            _ => 0.001,
        })
        .sum::<f64>()
        .clamp(0.0, 1.0);
    let liquidity_depth = path.iter().map(|edge| edge.liquidity).min().unwrap_or(0);
    let price_impact = 1.0 - amount as f64 / input as f64;

    let score = composite_score(
        amount,
        input,
        total_fees,
        total_time,
        privacy_score,
        weights,
    );

    Route {
        id: generate_route_id(),
        hops,
        estimated_output: amount,
        estimated_fees,
        estimated_time_secs: total_time,
        slippage_risk,
        liquidity_depth,
        price_impact,
        privacy_score,
        score,
    }
}

/// `floor(amount * rate)` with exact decimal arithmetic.
fn fee_floor(amount: u128, rate: Decimal) -> u128 {
    let amount_dec = Decimal::from_i128_with_scale(amount as i128, 0);
    (amount_dec * rate).floor().to_u128().unwrap_or(0)
}

/// 100 minus 15 per non-privacy endpoint and 20 per bridge hop, floored at 0.
fn privacy_score(path: &[GraphEdge]) -> f64 {
    let mut score: f64 = 100.0;
    for edge in path {
        if !edge.from.is_privacy() {
            score -= 15.0;
        }
        if !edge.to.is_privacy() {
            score -= 15.0;
        }
        if edge.mechanism == SwapMechanism::Bridge {
            score -= 20.0;
        }
    }
    score.max(0.0)
}

/// Weighted composite of output, fee, time, and privacy sub-scores.
pub fn composite_score(
    output: u128,
    input: u128,
    total_fees: u128,
    total_time_secs: u64,
    privacy_score: f64,
    weights: ScoreWeights,
) -> f64 {
    let input_f = input as f64;
    let output_score = output as f64 / input_f;
    let fee_score = 1.0 - total_fees as f64 / input_f;
    let time_score = (1.0 - total_time_secs as f64 / 3600.0).max(0.0);
    let privacy = privacy_score / 100.0;

    weights.privacy * privacy
        + weights.output * output_score
        + weights.fee * fee_score
        + weights.time * time_score
}
