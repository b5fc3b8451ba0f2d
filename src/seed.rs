//! Demo data for local development.

use crate::db::{Database, DbError};
use crate::params;
use sha2::{Digest, Sha256};
use tracing::info;

pub struct DemoUser {
    pub email: &'static str,
    pub password: &'static str,
    pub name: &'static str,
    pub role: &'static str,
}

pub struct DemoParkingLot {
    pub name: &'static str,
    pub location: &'static str,
    pub total_spaces: i64,
    pub available_spaces: i64,
    pub price_per_hour: f64,
}

pub const DEMO_USERS: [DemoUser; 3] = [
    DemoUser {
        email: "admin@miparqueo.com",
        password: "admin123",
        name: "Administrador",
        role: "admin",
    },
    DemoUser {
        email: "usuario@miparqueo.com",
        password: "usuario123",
        name: "Usuario Prueba",
        role: "user",
    },
    DemoUser {
        email: "test@example.com",
        password: "test123",
        name: "Test User",
        role: "user",
    },
];

pub const DEMO_PARKING_LOTS: [DemoParkingLot; 3] = [
    DemoParkingLot {
        name: "Parqueadero Centro",
        location: "Calle 50 #15-20",
        total_spaces: 150,
        available_spaces: 120,
        price_per_hour: 5000.0,
    },
    DemoParkingLot {
        name: "Parqueadero Norte",
        location: "Carrera 7 #100-50",
        total_spaces: 200,
        available_spaces: 85,
        price_per_hour: 4000.0,
    },
    DemoParkingLot {
        name: "Parqueadero Mall",
        location: "Avenida Boyacá #120-10",
        total_spaces: 500,
        available_spaces: 350,
        price_per_hour: 3500.0,
    },
];

/// Rows actually inserted by `load_demo_data`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users_inserted: u64,
    pub parking_lots_inserted: u64,
}

/// Hex-encoded SHA-256 of a password, as stored in `users.password`.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Insert the demo users and parking lots, skipping any that already exist.
///
/// Users are matched by email, parking lots by name, so running it twice
/// inserts nothing the second time.
pub async fn load_demo_data(db: &Database) -> Result<SeedReport, DbError> {
    let mut report = SeedReport::default();

    for user in &DEMO_USERS {
        let result = db
            .run(
                "INSERT INTO users (email, password, name, role) VALUES (?, ?, ?, ?) ON CONFLICT (email) DO NOTHING",
                &params![user.email, hash_password(user.password), user.name, user.role],
            )
            .await?;
        report.users_inserted += result.rows_affected;
    }

    for lot in &DEMO_PARKING_LOTS {
        let result = db
            .run(
                "INSERT INTO parking_lots (name, location, total_spaces, available_spaces, price_per_hour) SELECT ?, ?, ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM parking_lots WHERE name = ?)",
                &params![
                    lot.name,
                    lot.location,
                    lot.total_spaces,
                    lot.available_spaces,
                    lot.price_per_hour,
                    lot.name
                ],
            )
            .await?;
        report.parking_lots_inserted += result.rows_affected;
    }

    info!(
        users = report.users_inserted,
        parking_lots = report.parking_lots_inserted,
        "Demo data loaded"
    );
    Ok(report)
}
