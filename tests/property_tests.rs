use fastrand::Rng;
use proptest::prelude::*;
use siteforge::optimizer::crossover::{crossover_one_point, crossover_uniform};
use siteforge::optimizer::initialization::create_heuristic_individual;
use siteforge::optimizer::mutation::{mutate, MutationGuard};
use siteforge::optimizer::tournament::tournament_select;
use siteforge::selection::Selection;

// --- STRATEGIES ---

prop_compose! {
    fn arb_selection()(genes in prop::collection::vec(any::<bool>(), 1..120)) -> Selection {
        Selection::from_genes(genes)
    }
}

prop_compose! {
    fn arb_parents()(len in 2usize..100)(
        a in prop::collection::vec(any::<bool>(), len),
        b in prop::collection::vec(any::<bool>(), len),
    ) -> (Selection, Selection) {
        (Selection::from_genes(a), Selection::from_genes(b))
    }
}

proptest! {
    #[test]
    fn prop_repair_respects_budget(mut sel in arb_selection(), budget in 0usize..60, seed in any::<u64>()) {
        let mut rng = Rng::with_seed(seed);
        let before = sel.active_count();
        let cleared = sel.repair(budget, &mut rng);

        prop_assert!(sel.active_count() <= budget);
        prop_assert!(sel.active_count() <= before);
        prop_assert_eq!(before - sel.active_count(), cleared);
        prop_assert_eq!(cleared, before.saturating_sub(budget));
        // Once feasible, repair is a no-op
        let snapshot = sel.clone();
        prop_assert_eq!(sel.repair(budget, &mut rng), 0);
        prop_assert_eq!(sel, snapshot);
    }

    #[test]
    fn prop_repair_only_clears_genes(sel in arb_selection(), budget in 0usize..60, seed in any::<u64>()) {
        let mut rng = Rng::with_seed(seed);
        let mut repaired = sel.clone();
        repaired.repair(budget, &mut rng);
        for i in 0..sel.len() {
            prop_assert!(!repaired.is_active(i) || sel.is_active(i));
        }
    }

    #[test]
    fn prop_guarded_mutation_never_exceeds_budget(
        len in 1usize..150,
        budget_frac in 0.0f64..1.0,
        rate in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = Rng::with_seed(seed);
        let budget = (len as f64 * budget_frac) as usize;
        let mut sel = Selection::create_random(&mut rng, len, budget).unwrap();
        mutate(&mut sel, rate, budget, MutationGuard::GuardOnFlip, &mut rng);
        prop_assert!(sel.active_count() <= budget);
    }

    #[test]
    fn prop_repair_after_mutation_ends_feasible(
        sel in arb_selection(),
        budget in 0usize..60,
        rate in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = Rng::with_seed(seed);
        let mut sel = sel;
        mutate(&mut sel, rate, budget, MutationGuard::RepairAfter, &mut rng);
        prop_assert!(sel.active_count() <= budget);
    }

    #[test]
    fn prop_uniform_crossover_keeps_gene_provenance(
        (a, b) in arb_parents(),
        indpb in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = Rng::with_seed(seed);
        // A budget as large as the chromosome means no repair
        let (c, d) = crossover_uniform(&a, &b, indpb, a.len(), &mut rng);
        for i in 0..a.len() {
            let kept = c.is_active(i) == a.is_active(i) && d.is_active(i) == b.is_active(i);
            let swapped = c.is_active(i) == b.is_active(i) && d.is_active(i) == a.is_active(i);
            prop_assert!(kept || swapped, "gene {}", i);
        }
        prop_assert_eq!(c.active_count() + d.active_count(), a.active_count() + b.active_count());
    }

    #[test]
    fn prop_one_point_crossover_exchanges_a_tail((a, b) in arb_parents(), seed in any::<u64>()) {
        let mut rng = Rng::with_seed(seed);
        let (c, d) = crossover_one_point(&a, &b, a.len(), &mut rng);
        let cut = (0..a.len())
            .find(|&i| c.is_active(i) != a.is_active(i))
            .unwrap_or(a.len());
        for i in 0..a.len() {
            if i < cut {
                prop_assert_eq!(c.is_active(i), a.is_active(i));
                prop_assert_eq!(d.is_active(i), b.is_active(i));
            } else {
                prop_assert_eq!(c.is_active(i), b.is_active(i));
                prop_assert_eq!(d.is_active(i), a.is_active(i));
            }
        }
    }

    #[test]
    fn prop_crossover_children_respect_budget((a, b) in arb_parents(), budget in 0usize..40, seed in any::<u64>()) {
        let mut rng = Rng::with_seed(seed);
        let (c, d) = crossover_uniform(&a, &b, 0.5, budget, &mut rng);
        prop_assert!(c.active_count() <= budget && d.active_count() <= budget);
        let (e, f) = crossover_one_point(&a, &b, budget, &mut rng);
        prop_assert!(e.active_count() <= budget && f.active_count() <= budget);
    }

    #[test]
    fn prop_perturbation_stays_in_budget(
        len in 1usize..100,
        prob in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let mut rng = Rng::with_seed(seed);
        let budget = len / 2;
        let base = Selection::create_random(&mut rng, len, budget).unwrap();
        let child = create_heuristic_individual(&base, prob, budget, &mut rng);
        prop_assert!(child.active_count() <= budget);
        let copy = create_heuristic_individual(&base, 0.0, budget, &mut rng);
        prop_assert_eq!(copy, base);
    }
}

#[test]
fn test_tournament_of_one_has_no_selection_pressure() {
    // Fitness strictly increasing with index: any bias would drag the mean down
    let fitnesses: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let mut rng = Rng::with_seed(17);
    let winners = tournament_select(&fitnesses, 20_000, 1, &mut rng);

    let mean = winners.iter().sum::<usize>() as f64 / winners.len() as f64;
    assert!((mean - 4.5).abs() < 0.15, "mean index {}", mean);

    let mut counts = [0usize; 10];
    for w in winners {
        counts[w] += 1;
    }
    assert!(counts.iter().all(|&c| (1700..2300).contains(&c)), "{:?}", counts);
}

#[test]
fn test_larger_tournaments_favour_lower_fitness() {
    let fitnesses: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let mut rng = Rng::with_seed(17);
    let mean = |k: usize, rng: &mut Rng| {
        let w = tournament_select(&fitnesses, 5_000, k, rng);
        w.iter().sum::<usize>() as f64 / w.len() as f64
    };
    let m1 = mean(1, &mut rng);
    let m4 = mean(4, &mut rng);
    assert!(m4 < m1 - 1.0, "k=1 {} k=4 {}", m1, m4);
}
