// Criterion benchmarks for the discovery hot path

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeSet;

use swipe_engine::core::{calculate_bounding_box, calculate_compatibility, haversine_distance, paginate, rank_candidates};
use swipe_engine::models::{DiscoveryFilters, GeoPoint, LookingFor, Profile};

const HOBBIES: [&str; 6] = ["hiking", "jazz", "chess", "football", "cooking", "travel"];

fn create_candidate(id: usize, lat: f64, lon: f64) -> Profile {
    Profile {
        user_id: format!("user-{}", id),
        display_name: format!("User {}", id),
        age: 20 + (id % 20) as u8,
        gender: if id % 2 == 0 { "female" } else { "male" }.to_string(),
        interested_in: ["male".to_string()].into_iter().collect(),
        looking_for: if id % 3 == 0 { LookingFor::Casual } else { LookingFor::Relationship },
        bio: None,
        interests: HOBBIES.iter().skip(id % 4).take(3).map(|h| h.to_string()).collect(),
        photos: vec![],
        location: Some(GeoPoint::new(lon, lat)),
        is_searchable: true,
        is_active: true,
        blocked_users: BTreeSet::new(),
        total_matches: 0,
        total_swipes: 0,
        verification_score: (id % 4) as u8,
        boost_expires_at: None,
        push_token: None,
        updated_at: Utc::now(),
    }
}

fn create_requester() -> Profile {
    let mut requester = create_candidate(0, 6.5244, 3.3792);
    requester.user_id = "current_user".to_string();
    requester.gender = "male".to_string();
    requester.interested_in = ["female".to_string()].into_iter().collect();
    requester
}

fn create_candidates(count: usize) -> Vec<Profile> {
    (1..=count)
        .map(|i| {
            let lat_offset = (i as f64 * 0.001) % 0.5;
            let lon_offset = (i as f64 * 0.0007) % 0.5;
            create_candidate(i, 6.5244 + lat_offset, 3.3792 + lon_offset)
        })
        .collect()
}

fn filters() -> DiscoveryFilters {
    DiscoveryFilters {
        age_min: 18,
        age_max: 40,
        max_distance_km: 50.0,
        page: 1,
        limit: 20,
        location: None,
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(6.5244),
                black_box(3.3792),
                black_box(6.6018),
                black_box(3.3515),
            )
        });
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(6.5244), black_box(3.3792), black_box(50.0)));
    });
}

fn bench_compatibility(c: &mut Criterion) {
    let requester = create_requester();
    let candidate = create_candidate(42, 6.55, 3.40);

    c.bench_function("calculate_compatibility", |b| {
        b.iter(|| calculate_compatibility(black_box(&requester), black_box(&candidate)));
    });
}

fn bench_ranking(c: &mut Criterion) {
    let requester = create_requester();
    let filters = filters();

    let mut group = c.benchmark_group("ranking");

    for candidate_count in [10, 100, 500, 1000].iter() {
        let candidates = create_candidates(*candidate_count);

        group.bench_with_input(
            BenchmarkId::new("rank_and_paginate", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    let ranked = rank_candidates(
                        black_box(&requester),
                        black_box(candidates.clone()),
                        &filters,
                        Utc::now(),
                    );
                    paginate(ranked, &filters)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_compatibility,
    bench_ranking
);

criterion_main!(benches);
