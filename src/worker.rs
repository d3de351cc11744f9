// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - worker.rs
 *
 * Copyright (C) 2022-2024 Hubert Figuière
 *
 * This library is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This library is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this library.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! Row-range dispatch for the Scaler and Lookup kernels.
//!
//! The kernels themselves only know how to process `[y0, y1)`; something
//! else has to slice `[0, total_rows)` into disjoint ranges and run them,
//! in parallel if it likes. That's this module's job.

/// Partitions a row range and dispatches a per-range task over it.
///
/// Implementations must invoke `task(y0, y1)` on disjoint sub-ranges of
/// `[0, total_rows)` that cover it exactly once. Row order and slice
/// boundaries are not observable in the output: the scaler and lookup
/// kernels seed their per-row PRNG purely from the row index, so any
/// partitioning scheme is conformant.
pub trait Worker: Sync {
    fn dispatch(&self, total_rows: u32, task: &(dyn Fn(u32, u32) + Sync));
}

/// Default [`Worker`] built on `rayon`'s work-stealing thread pool, the
/// same data-parallel primitive the donor codebase uses for per-tile
/// decompression work.
///
/// Splits `[0, total_rows)` into chunks of roughly `total_rows / 2 *
/// rayon::current_num_threads()` rows so that small images aren't sliced
/// more finely than they have rows to give each thread useful work.
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonWorker;

impl RayonWorker {
    /// Single-threaded worker, useful for tests that want deterministic
    /// dispatch order without pulling in the thread pool.
    pub fn single_threaded(total_rows: u32, task: &(dyn Fn(u32, u32) + Sync)) {
        if total_rows > 0 {
            task(0, total_rows);
        }
    }
}

impl Worker for RayonWorker {
    fn dispatch(&self, total_rows: u32, task: &(dyn Fn(u32, u32) + Sync)) {
        if total_rows == 0 {
            return;
        }
        let threads = rayon::current_num_threads().max(1) as u32;
        // Two chunks per thread keeps the pool busy without slicing a
        // handful of rows into more pieces than it has rows.
        let chunks = (threads * 2).min(total_rows).max(1);
        let chunk_rows = total_rows.div_ceil_compat(chunks);

        use rayon::prelude::*;
        let ranges: Vec<(u32, u32)> = (0..total_rows)
            .step_by(chunk_rows as usize)
            .map(|y0| (y0, (y0 + chunk_rows).min(total_rows)))
            .collect();

        ranges.into_par_iter().for_each(|(y0, y1)| task(y0, y1));
    }
}

trait DivCeil {
    fn div_ceil_compat(self, rhs: Self) -> Self;
}

impl DivCeil for u32 {
    fn div_ceil_compat(self, rhs: Self) -> Self {
        (self + rhs - 1) / rhs
    }
}

#[cfg(test)]
mod test {
    use super::{RayonWorker, Worker};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_covers_every_row_exactly_once() {
        let worker = RayonWorker;
        let seen: Mutex<Vec<bool>> = Mutex::new(vec![false; 100]);
        worker.dispatch(100, &|y0, y1| {
            let mut seen = seen.lock().unwrap();
            for y in y0..y1 {
                assert!(!seen[y as usize], "row {y} visited twice");
                seen[y as usize] = true;
            }
        });
        assert!(seen.lock().unwrap().iter().all(|&v| v));
    }

    #[test]
    fn test_dispatch_zero_rows_invokes_nothing() {
        let worker = RayonWorker;
        let calls = AtomicU32::new(0);
        worker.dispatch(0, &|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_threaded_covers_full_range() {
        let seen = Mutex::new(Vec::new());
        RayonWorker::single_threaded(5, &|y0, y1| {
            seen.lock().unwrap().push((y0, y1));
        });
        assert_eq!(*seen.lock().unwrap(), vec![(0, 5)]);
    }
}
