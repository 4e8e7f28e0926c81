//! PhotonMesh Benchmark Suite

use photonmesh::{Basis, MeshLayer, MeshModel, MziErrors, Transformer};

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn random_mesh(n: usize, rng: &mut StdRng) -> photonmesh::MeshResult<MeshLayer> {
    let cells = n / 2;
    let normal = Normal::new(0.0, 0.05).expect("valid standard deviation");

    let perms: Vec<Vec<usize>> = (0..=n)
        .map(|_| {
            let mut perm: Vec<usize> = (0..n).collect();
            perm.shuffle(rng);
            perm
        })
        .collect();
    let e_l = Array2::from_shape_fn((n, cells), |_| normal.sample(rng));
    let e_r = Array2::from_shape_fn((n, cells), |_| normal.sample(rng));

    let model = MeshModel::new(n, n)?
        .with_basis(Basis::Bloch)
        .with_perm_idx(perms)?
        .with_errors(MziErrors::from_splitter_errors(&e_l, &e_r)?)?;

    let mut mesh = MeshLayer::new(model)?;
    mesh.theta = Array2::from_shape_fn((n, cells), |_| rng.gen_range(0.0..2.0 * PI));
    mesh.phi = Array2::from_shape_fn((n, cells), |_| rng.gen_range(0.0..2.0 * PI));
    mesh.gamma = Array1::from_shape_fn(n, |_| rng.gen_range(0.0..2.0 * PI));
    Ok(mesh)
}

fn random_batch(batch: usize, n: usize, rng: &mut StdRng) -> Array2<Complex64> {
    Array2::from_shape_fn((batch, n), |_| {
        Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
    })
}

fn benchmark_transform(rng: &mut StdRng) -> photonmesh::MeshResult<()> {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Mesh Transform (forward + inverse)");
    println!("{}", "=".repeat(60));

    let sizes = [4, 8, 16, 32, 64];
    let batch = 256;

    for &n in &sizes {
        let mesh = random_mesh(n, rng)?;
        let x = random_batch(batch, n, rng);

        // Warm up
        let mut y = mesh.transform_signal(&x)?;
        let mut x_back = mesh.inverse_transform_signal(&y)?;

        let n_iters = if n <= 16 { 100 } else { 10 };

        let start = Instant::now();
        for _ in 0..n_iters {
            y = mesh.transform_signal(&x)?;
        }
        let forward = start.elapsed().as_secs_f64() / n_iters as f64;

        let start = Instant::now();
        for _ in 0..n_iters {
            x_back = mesh.inverse_transform_signal(&y)?;
        }
        let inverse = start.elapsed().as_secs_f64() / n_iters as f64;

        let error = (&x_back - &x)
            .iter()
            .map(|v| v.norm())
            .fold(0.0_f64, f64::max);

        println!(
            "  {}x{} ({} layers, batch {}): {:.1} μs forward, {:.1} μs inverse",
            n,
            n,
            n,
            batch,
            forward * 1e6,
            inverse * 1e6
        );
        println!("         Round-trip max error: {:.2e}", error);
    }
    Ok(())
}

fn benchmark_matrix(rng: &mut StdRng) -> photonmesh::MeshResult<()> {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK: Transfer Matrix Extraction");
    println!("{}", "=".repeat(60));

    for &n in &[8, 32, 128] {
        let mesh = random_mesh(n, rng)?;

        let start = Instant::now();
        let u = mesh.matrix()?;
        let elapsed = start.elapsed().as_secs_f64();

        let u_h = u.t().mapv(|v| v.conj());
        let product = u.dot(&u_h);
        let deviation = product
            .indexed_iter()
            .map(|((i, j), v)| {
                let expected = if i == j { 1.0 } else { 0.0 };
                (v - Complex64::new(expected, 0.0)).norm()
            })
            .fold(0.0_f64, f64::max);

        println!(
            "  {}x{}: {:.3} ms, max |UU† - I| = {:.2e}",
            n,
            n,
            elapsed * 1000.0,
            deviation
        );
    }
    Ok(())
}

fn main() -> photonmesh::MeshResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("\n{}", "#".repeat(60));
    println!("#  PhotonMesh Rust Benchmark Suite");
    println!("{}", "#".repeat(60));

    let mut rng = StdRng::seed_from_u64(2024);
    benchmark_transform(&mut rng)?;
    benchmark_matrix(&mut rng)?;

    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK COMPLETE");
    println!("{}", "=".repeat(60));
    Ok(())
}
