//! Fake user generation for filling the application database.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{Flag, NewUser};

const FORENAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Nancy", "Matthew", "Lisa", "Anthony", "Betty", "Mark", "Sandra",
];

const SURNAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Clark",
];

const STREETS: &[&str] = &[
    "Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Washington", "Lake", "Hill", "Park", "View",
    "Sunset", "River", "Church", "Mill",
];

const STREET_SUFFIXES: &[&str] = &["St", "Ave", "Rd", "Blvd", "Ln", "Dr", "Ct", "Way"];

const SECONDARY: &[&str] = &["Apt.", "Suite"];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton", "Fairview",
    "Salem", "Madison", "Georgetown", "Arlington", "Ashland", "Dover", "Oxford", "Jackson",
];

const STATES: &[&str] = &[
    "Alabama", "Alaska", "Arizona", "California", "Colorado", "Florida", "Georgia", "Idaho",
    "Illinois", "Kansas", "Maine", "Montana", "Nevada", "Ohio", "Oregon", "Texas", "Utah",
    "Vermont", "Virginia", "Washington",
];

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+";

/// Probability that a generated user is an administrator.
const ADMIN_PROBABILITY: f64 = 0.05;

/// Builds [`NewUser`] rows with sequential `userid`s (`user_0`, `user_1`, ...).
#[derive(Debug, Default)]
pub struct UserFactory {
    sequence: usize,
}

impl UserFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `count` users.
    pub fn build_batch(&mut self, count: usize) -> Vec<NewUser> {
        let mut rng = rand::thread_rng();
        (0..count).map(|_| self.build_with(&mut rng)).collect()
    }

    fn build_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> NewUser {
        let n = self.sequence;
        self.sequence += 1;

        NewUser {
            userid: format!("user_{}", n),
            passwd: password(rng),
            surname: pick(rng, SURNAMES),
            forename: pick(rng, FORENAMES),
            telno: phone_number(rng),
            addr1: Some(format!(
                "{} {} {}",
                rng.gen_range(1..10_000),
                pick(rng, STREETS),
                pick(rng, STREET_SUFFIXES)
            )),
            addr2: Some(format!("{} {}", pick(rng, SECONDARY), rng.gen_range(100..1_000))),
            city: Some(pick(rng, CITIES)),
            state: Some(pick(rng, STATES)),
            postcode: Some(format!("{:05}", rng.gen_range(501..99_951))),
            active: Flag::from(rng.gen_bool(0.5)),
            admin: Flag::from(rng.gen_bool(ADMIN_PROBABILITY)),
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&str]) -> String {
    items.choose(rng).copied().unwrap_or_default().to_string()
}

fn password<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..10)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

fn phone_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "({:03}) {:03}-{:04}",
        rng.gen_range(200..1_000),
        rng.gen_range(200..1_000),
        rng.gen_range(0..10_000)
    )
}
