use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use rust_decimal::Decimal;
use storefront_cart::CartItem;
use storefront_catalog::Product;
use storefront_core::{CategoryId, Money, ProductId, UserId};
use storefront_orders::{CheckoutLine, plan_checkout};

fn cart_lines(n: usize) -> Vec<CheckoutLine> {
    (1..=n as i64)
        .map(|id| {
            let product = Product::new(
                ProductId::from_raw(id),
                format!("Product {id}"),
                Money::new(Decimal::new(1999 + id, 2)).unwrap(),
                1_000,
                CategoryId::from_raw(1),
            )
            .unwrap();
            CheckoutLine {
                item: CartItem {
                    product_id: ProductId::from_raw(id),
                    quantity: (id % 7 + 1) as i32,
                },
                product: Some(product),
            }
        })
        .collect()
}

fn bench_plan_checkout(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_checkout");
    let user = UserId::parse("bench-user").unwrap();

    for lines in [1usize, 10, 50, 200].iter() {
        let cart = cart_lines(*lines);
        group.throughput(Throughput::Elements(*lines as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &cart, |b, cart| {
            b.iter(|| plan_checkout(black_box(&user), black_box(cart), Utc::now()).unwrap());
        });
    }

    group.finish();
}

fn bench_rejected_checkout(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_checkout_rejected");
    let user = UserId::parse("bench-user").unwrap();

    // The last line overdraws, so every line is validated before the failure.
    let mut cart = cart_lines(50);
    if let Some(last) = cart.last_mut() {
        last.item.quantity = 5_000;
    }

    group.bench_function("last_line_overdrawn", |b| {
        b.iter(|| plan_checkout(black_box(&user), black_box(&cart), Utc::now()).unwrap_err());
    });

    group.finish();
}

criterion_group!(benches, bench_plan_checkout, bench_rejected_checkout);
criterion_main!(benches);
