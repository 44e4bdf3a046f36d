//! Database fixtures for service tests

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub async fn company(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO companies (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn store(pool: &PgPool, company_id: Uuid, name: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO stores (company_id, name) VALUES ($1, $2) RETURNING id")
        .bind(company_id)
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn product(
    pool: &PgPool,
    store_id: Uuid,
    name: &str,
    sku: Option<&str>,
    stock: &str,
) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO products (store_id, name, sku, default_price, stock_quantity)
        VALUES ($1, $2, $3, 10, $4)
        RETURNING id
        "#,
    )
    .bind(store_id)
    .bind(name)
    .bind(sku)
    .bind(dec(stock))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn ingredient(pool: &PgPool, store_id: Uuid, name: &str, stock: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO ingredients (store_id, name, unit, unit_cost, stock_quantity)
        VALUES ($1, $2, 'kg', 1.5, $3)
        RETURNING id
        "#,
    )
    .bind(store_id)
    .bind(name)
    .bind(dec(stock))
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Attach a recipe line and mark the product composite
pub async fn recipe_line(pool: &PgPool, product_id: Uuid, ingredient_id: Uuid, quantity_needed: &str) {
    sqlx::query(
        r#"
        INSERT INTO product_recipes (product_id, ingredient_id, quantity_needed, unit)
        VALUES ($1, $2, $3, 'kg')
        "#,
    )
    .bind(product_id)
    .bind(ingredient_id)
    .bind(dec(quantity_needed))
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("UPDATE products SET is_composite = TRUE WHERE id = $1")
        .bind(product_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn product_stock(pool: &PgPool, product_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn ingredient_stock(pool: &PgPool, ingredient_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT stock_quantity FROM ingredients WHERE id = $1")
        .bind(ingredient_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await.unwrap()
}
