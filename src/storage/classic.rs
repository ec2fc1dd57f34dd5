//! The classic 22-property board (US edition prices).
//!
//! Railroads and utilities are not developable and are left out.

use crate::types::{Board, Property, PropertyId};

struct Row {
    position: u8,
    name: &'static str,
    price: i64,
    base_rent: i64,
    house_rents: [i64; 4],
    hotel_rent: i64,
    house_cost: i64,
    group: &'static str,
}

#[rustfmt::skip]
const ROWS: [Row; 22] = [
    Row { position: 1,  name: "Mediterranean Avenue",  price: 60,  base_rent: 2,  house_rents: [10, 30, 90, 160],     hotel_rent: 250,  house_cost: 50,  group: "brown" },
    Row { position: 3,  name: "Baltic Avenue",         price: 60,  base_rent: 4,  house_rents: [20, 60, 180, 320],    hotel_rent: 450,  house_cost: 50,  group: "brown" },
    Row { position: 6,  name: "Oriental Avenue",       price: 100, base_rent: 6,  house_rents: [30, 90, 270, 400],    hotel_rent: 550,  house_cost: 50,  group: "light-blue" },
    Row { position: 8,  name: "Vermont Avenue",        price: 100, base_rent: 6,  house_rents: [30, 90, 270, 400],    hotel_rent: 550,  house_cost: 50,  group: "light-blue" },
    Row { position: 9,  name: "Connecticut Avenue",    price: 120, base_rent: 8,  house_rents: [40, 100, 300, 450],   hotel_rent: 600,  house_cost: 50,  group: "light-blue" },
    Row { position: 11, name: "St. Charles Place",     price: 140, base_rent: 10, house_rents: [50, 150, 450, 625],   hotel_rent: 750,  house_cost: 100, group: "pink" },
    Row { position: 13, name: "States Avenue",         price: 140, base_rent: 10, house_rents: [50, 150, 450, 625],   hotel_rent: 750,  house_cost: 100, group: "pink" },
    Row { position: 14, name: "Virginia Avenue",       price: 160, base_rent: 12, house_rents: [60, 180, 500, 700],   hotel_rent: 900,  house_cost: 100, group: "pink" },
    Row { position: 16, name: "St. James Place",       price: 180, base_rent: 14, house_rents: [70, 200, 550, 750],   hotel_rent: 950,  house_cost: 100, group: "orange" },
    Row { position: 18, name: "Tennessee Avenue",      price: 180, base_rent: 14, house_rents: [70, 200, 550, 750],   hotel_rent: 950,  house_cost: 100, group: "orange" },
    Row { position: 19, name: "New York Avenue",       price: 200, base_rent: 16, house_rents: [80, 220, 600, 800],   hotel_rent: 1000, house_cost: 100, group: "orange" },
    Row { position: 21, name: "Kentucky Avenue",       price: 220, base_rent: 18, house_rents: [90, 250, 700, 875],   hotel_rent: 1050, house_cost: 150, group: "red" },
    Row { position: 23, name: "Indiana Avenue",        price: 220, base_rent: 18, house_rents: [90, 250, 700, 875],   hotel_rent: 1050, house_cost: 150, group: "red" },
    Row { position: 24, name: "Illinois Avenue",       price: 240, base_rent: 20, house_rents: [100, 300, 750, 925],  hotel_rent: 1100, house_cost: 150, group: "red" },
    Row { position: 26, name: "Atlantic Avenue",       price: 260, base_rent: 22, house_rents: [110, 330, 800, 975],  hotel_rent: 1150, house_cost: 150, group: "yellow" },
    Row { position: 27, name: "Ventnor Avenue",        price: 260, base_rent: 22, house_rents: [110, 330, 800, 975],  hotel_rent: 1150, house_cost: 150, group: "yellow" },
    Row { position: 29, name: "Marvin Gardens",        price: 280, base_rent: 24, house_rents: [120, 360, 850, 1025], hotel_rent: 1200, house_cost: 150, group: "yellow" },
    Row { position: 31, name: "Pacific Avenue",        price: 300, base_rent: 26, house_rents: [130, 390, 900, 1100], hotel_rent: 1275, house_cost: 200, group: "green" },
    Row { position: 32, name: "North Carolina Avenue", price: 300, base_rent: 26, house_rents: [130, 390, 900, 1100], hotel_rent: 1275, house_cost: 200, group: "green" },
    Row { position: 34, name: "Pennsylvania Avenue",   price: 320, base_rent: 28, house_rents: [150, 450, 1000, 1200], hotel_rent: 1400, house_cost: 200, group: "green" },
    Row { position: 37, name: "Park Place",            price: 350, base_rent: 35, house_rents: [175, 500, 1100, 1300], hotel_rent: 1500, house_cost: 200, group: "dark-blue" },
    Row { position: 39, name: "Boardwalk",             price: 400, base_rent: 50, house_rents: [200, 600, 1400, 1700], hotel_rent: 2000, house_cost: 200, group: "dark-blue" },
];

/// Squares on the classic board, including non-property squares.
pub const BOARD_SQUARES: u8 = 40;

pub fn classic_board() -> Board {
    let properties = ROWS
        .iter()
        .enumerate()
        .map(|(i, row)| Property {
            id: PropertyId(i as u32 + 1),
            name: row.name.to_string(),
            position: row.position,
            price: row.price,
            base_rent: row.base_rent,
            house_rents: row.house_rents,
            hotel_rent: row.hotel_rent,
            house_cost: row.house_cost,
            group: row.group.to_string(),
        })
        .collect();
    Board::new(properties)
}
