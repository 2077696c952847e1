use std::sync::Barrier;
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use anyhow::{anyhow, bail};
use chrono::{Duration, Utc};
use clap::Parser;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

#[derive(Parser)]
struct Args {
    /// Base URL of a running server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// How many concurrent casts to fire. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    #[arg(long, default_value = "admin@example.edu")]
    admin_email: String,

    #[arg(long)]
    admin_password: String,

    /// A registered voter. They are verified by the administrator before the storm.
    #[arg(long)]
    voter_email: String,

    #[arg(long)]
    voter_password: String,
}

#[derive(Deserialize)]
struct Candidate {
    id: String,
}

#[derive(Deserialize)]
struct ElectionDetail {
    id: String,
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Session {
    Anonymous,
    Voter { id: String },
    Administrator { id: String },
}

#[derive(Deserialize)]
struct Results {
    total_votes: u64,
}

/// Join a path onto the base URL.
fn url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Sign in and return a client holding the session cookies.
fn login(base: &str, email: &str, password: &str) -> anyhow::Result<Client> {
    let client = Client::builder().cookie_store(true).build()?;
    client
        .post(url(base, "auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .and_then(Response::error_for_status)?;
    Ok(client)
}

/// Create a fresh, already-open election with two candidates.
fn setup_election(base: &str, admin: &Client) -> anyhow::Result<ElectionDetail> {
    let start = Utc::now() - Duration::minutes(5);
    let end = start + Duration::hours(1);
    let election = json!({
        "title": "Vote storm",
        "description": "Concurrent double-vote check",
        "start_time": start,
        "end_time": end,
        "candidates": [{ "name": "Alice" }, { "name": "Bob" }],
    });
    let detail: ElectionDetail = admin
        .post(url(base, "admin/elections"))
        .json(&election)
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    if detail.candidates.len() < 2 {
        bail!("election was created without its candidates");
    }
    Ok(detail)
}

/// Make sure the voter may vote.
fn verify_voter(base: &str, admin: &Client, voter: &Client) -> anyhow::Result<()> {
    let session: Session = voter
        .get(url(base, "auth/session"))
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    let id = match session {
        Session::Voter { id } => id,
        Session::Administrator { id } => bail!("{id} is the administrator, not a voter"),
        Session::Anonymous => bail!("voter login did not stick"),
    };
    admin
        .post(url(base, &format!("admin/voters/{id}/verify")))
        .send()
        .and_then(Response::error_for_status)?;
    Ok(())
}

/// What happened to each cast.
#[derive(Debug, Default)]
struct Tally {
    recorded: usize,
    already_voted: usize,
    unavailable: usize,
    other: Vec<StatusCode>,
    slowest: StdDuration,
}

fn storm(base: &str, args: &Args, election: &ElectionDetail) -> anyhow::Result<Tally> {
    // One session per thread, all for the same voter.
    let clients = (0..args.threads)
        .map(|_| login(base, &args.voter_email, &args.voter_password))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let barrier = Barrier::new(clients.len());
    let vote_url = url(base, &format!("voter/elections/{}/vote", election.id));

    let outcomes = thread::scope(|s| {
        let threads: Vec<_> = clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                let candidate = &election.candidates[i % election.candidates.len()].id;
                let (barrier, vote_url) = (&barrier, &vote_url);
                s.spawn(move || {
                    barrier.wait();
                    let start = Instant::now();
                    let status = client
                        .post(vote_url)
                        .json(&json!({ "candidate_id": candidate }))
                        .send()
                        .map(|resp| resp.status());
                    (status, start.elapsed())
                })
            })
            .collect();
        threads
            .into_iter()
            .map(|t| t.join().map_err(|_| anyhow!("thread panicked")))
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut tally = Tally::default();
    for (status, elapsed) in outcomes {
        tally.slowest = tally.slowest.max(elapsed);
        match status? {
            StatusCode::CREATED => tally.recorded += 1,
            StatusCode::CONFLICT => tally.already_voted += 1,
            StatusCode::SERVICE_UNAVAILABLE => tally.unavailable += 1,
            other => tally.other.push(other),
        }
    }
    Ok(tally)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base = args.url.as_str();

    let admin = login(base, &args.admin_email, &args.admin_password)?;
    let voter = login(base, &args.voter_email, &args.voter_password)?;
    verify_voter(base, &admin, &voter)?;
    let election = setup_election(base, &admin)?;
    println!("election {} ready, firing {} casts", election.id, args.threads);

    let tally = storm(base, &args, &election)?;
    println!("recorded:      {}", tally.recorded);
    println!("already voted: {}", tally.already_voted);
    println!("unavailable:   {}", tally.unavailable);
    println!("other:         {:?}", tally.other);
    println!("slowest cast:  {:?}", tally.slowest);

    let results: Results = admin
        .get(url(base, &format!("elections/{}/results", election.id)))
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    println!("stored total:  {}", results.total_votes);

    if tally.recorded != 1 || results.total_votes != 1 || !tally.other.is_empty() {
        bail!("expected exactly one recorded vote");
    }
    println!("\nok: exactly one vote recorded");
    Ok(())
}
