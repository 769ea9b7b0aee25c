use fastrand::Rng;

/// Picks `k` parent indices. Each draw samples `tournament_size` distinct
/// individuals and keeps the one with the lowest fitness. Draws are
/// independent, so the same individual can win more than once.
pub fn tournament_select(
    fitnesses: &[f64],
    k: usize,
    tournament_size: usize,
    rng: &mut Rng,
) -> Vec<usize> {
    let n = fitnesses.len();
    if n == 0 {
        return Vec::new();
    }
    let size = tournament_size.clamp(1, n);
    let mut pool: Vec<usize> = (0..n).collect();

    (0..k)
        .map(|_| {
            let mut winner = None::<usize>;
            for slot in 0..size {
                let pick = rng.usize(slot..n);
                pool.swap(slot, pick);
                let contender = pool[slot];
                winner = match winner {
                    Some(w) if fitnesses[w] <= fitnesses[contender] => Some(w),
                    _ => Some(contender),
                };
            }
            winner.unwrap_or(0)
        })
        .collect()
}
