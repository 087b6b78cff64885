use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::pool::{ConnectionProfile, SupporterRecord};
use crate::{GenreProfile, Target};

const CATALOGUE: &[(&str, &[&str])] = &[
    ("house", &["deep house", "tech house", "garage", "disco"]),
    ("techno", &["minimal", "acid", "industrial", "tech house"]),
    ("drum & bass", &["liquid", "jungle", "neurofunk"]),
    ("hip hop", &["boom bap", "trap", "lo-fi"]),
    ("pop", &["synthpop", "indie pop", "disco"]),
];

pub fn generate_synthetic_pool(size: usize, seed: u64) -> Vec<SupporterRecord> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..size)
        .map(|idx| {
            let genre = sample_genre(&mut rng);
            let followers = 10f64.powf(rng.gen_range(2.0..6.0)).floor();
            let status = if rng.gen::<f64>() < 0.05 { "inactive" } else { "active" };
            let engagement_rate = (rng.gen::<f64>() < 0.3).then(|| rng.gen_range(0.01..0.12));

            SupporterRecord {
                id: Some(format!("member_{:04}", idx)),
                display_name: Some(format!("Member {}", idx)),
                handle: Some(format!("@member{}", idx)),
                status: Some(status.to_string()),
                credit_balance: Some(rng.gen_range(0..=150)),
                followers: None,
                genre,
                connection: Some(ConnectionProfile {
                    platform: Some("soundcloud".to_string()),
                    profile_url: None,
                    follower_count: Some(followers),
                    engagement_rate,
                    reach_factor: None,
                }),
            }
        })
        .collect()
}

/// Targets owned by members of a pool of `pool_size`, one per queue slot.
pub fn generate_synthetic_targets(count: usize, pool_size: usize, seed: u64) -> Vec<Target> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    (0..count)
        .map(|idx| {
            let owner = format!("member_{:04}", rng.gen_range(0..pool_size.max(1)));
            let desired_reach = rng.gen_range(1..=60) * 100;
            Target::new(
                &format!("submission_{:04}", idx),
                &owner,
                sample_genre(&mut rng),
                desired_reach,
            )
        })
        .collect()
}

fn sample_genre(rng: &mut StdRng) -> GenreProfile {
    let (family, subgenres) = CATALOGUE[rng.gen_range(0..CATALOGUE.len())];
    let count = rng.gen_range(0..=subgenres.len().min(2));
    let picked: Vec<&str> = subgenres.choose_multiple(rng, count).copied().collect();
    GenreProfile::new(family, picked)
}
