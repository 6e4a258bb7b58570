// Flight data model shared by every source payload, cache slot and response

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// A flight number arrives either as a JSON number or a JSON string depending on the source.
// Numbers are kept as sent so they render back exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlightNumber {
    Number(Number),
    Text(String),
}

impl fmt::Display for FlightNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightNumber::Number(n) => write!(f, "{}", n),
            FlightNumber::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for FlightNumber {
    fn from(n: u64) -> Self {
        FlightNumber::Number(n.into())
    }
}

impl From<&str> for FlightNumber {
    fn from(s: &str) -> Self {
        FlightNumber::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Slice {
    pub flight_number: FlightNumber,
    pub departure_date_time_utc: String,

    // origin/destination names, arrival time, duration...
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Slice {
    pub fn new(flight_number: impl Into<FlightNumber>, departure_date_time_utc: &str) -> Self {
        Self {
            flight_number: flight_number.into(),
            departure_date_time_utc: departure_date_time_utc.to_string(),
            details: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Flight {
    pub slices: Vec<Slice>,

    // price and anything else the source sent along, carried through untouched
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Flight {
    pub fn new(slices: Vec<Slice>) -> Self {
        Self {
            slices,
            details: Map::new(),
        }
    }

    pub fn with_price(mut self, price: impl Into<Value>) -> Self {
        self.details.insert("price".to_string(), price.into());
        self
    }

    pub fn price(&self) -> Option<&Value> {
        self.details.get("price")
    }

    /// Composite identity of a flight: every slice's flight number followed by
    /// its departure time, concatenated in slice order.
    pub fn dedup_key(&self) -> String {
        let mut key = String::new();
        for slice in &self.slices {
            key.push_str(&slice.flight_number.to_string());
            key.push_str(&slice.departure_date_time_utc);
        }
        key
    }
}

// Wire shape of both an upstream source payload and the find-all response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FlightSet {
    pub flights: Vec<Flight>,
}

impl FlightSet {
    pub fn new(flights: Vec<Flight>) -> Self {
        Self { flights }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_payload() {
        let body = r#"{
            "flights": [
                {
                    "slices": [
                        {
                            "origin_name": "Schonefeld",
                            "destination_name": "Stansted",
                            "departure_date_time_utc": "2019-08-08T04:30:00.000Z",
                            "arrival_date_time_utc": "2019-08-08T06:25:00.000Z",
                            "flight_number": "144",
                            "duration": 115
                        },
                        {
                            "origin_name": "Stansted",
                            "destination_name": "Schonefeld",
                            "departure_date_time_utc": "2019-08-10T05:35:00.000Z",
                            "arrival_date_time_utc": "2019-08-10T07:35:00.000Z",
                            "flight_number": 8542,
                            "duration": 120
                        }
                    ],
                    "price": 129
                }
            ]
        }"#;

        let set = FlightSet::from_json(body.as_bytes()).unwrap();
        assert_eq!(set.len(), 1);

        let flight = &set.flights[0];
        assert_eq!(flight.price(), Some(&Value::from(129)));
        assert_eq!(flight.slices[0].flight_number, FlightNumber::Text("144".into()));
        assert_eq!(flight.slices[1].flight_number, FlightNumber::from(8542));
        assert_eq!(
            flight.slices[0].details.get("origin_name"),
            Some(&Value::String("Schonefeld".into()))
        );
        assert_eq!(
            flight.dedup_key(),
            "1442019-08-08T04:30:00.000Z85422019-08-10T05:35:00.000Z"
        );
    }

    #[test]
    fn test_unknown_fields_survive_serialization() {
        let body = r#"{"flights":[{"slices":[{"flight_number":1,"departure_date_time_utc":"T1","gate":"B7"}],"carrier":"XY"}]}"#;
        let set = FlightSet::from_json(body.as_bytes()).unwrap();
        let json = serde_json::to_value(&set).unwrap();

        assert_eq!(json["flights"][0]["carrier"], "XY");
        assert_eq!(json["flights"][0]["slices"][0]["gate"], "B7");
        assert!(json["flights"][0].get("price").is_none());
    }

    #[test]
    fn test_price_passes_through_as_sent() {
        let body = r#"{"flights":[
            {"slices":[{"flight_number":1,"departure_date_time_utc":"T1"}],"price":"129 EUR"},
            {"slices":[{"flight_number":2,"departure_date_time_utc":"T1"}],"price":null},
            {"slices":[{"flight_number":3,"departure_date_time_utc":"T1"}],"price":129}
        ]}"#;
        let set = FlightSet::from_json(body.as_bytes()).unwrap();
        assert_eq!(set.len(), 3);

        let out = serde_json::to_string(&set).unwrap();
        assert!(out.contains(r#""price":"129 EUR""#));
        assert!(out.contains(r#""price":null"#));
        assert!(out.contains(r#""price":129}"#));
        assert!(!out.contains("129.0"));
    }

    #[test]
    fn test_any_json_number_is_a_flight_number() {
        let body = r#"{"flights":[{"slices":[
            {"flight_number":-7,"departure_date_time_utc":"T1"},
            {"flight_number":12.5,"departure_date_time_utc":"T2"}
        ]}]}"#;
        let set = FlightSet::from_json(body.as_bytes()).unwrap();
        let flight = &set.flights[0];

        assert_eq!(flight.dedup_key(), "-7T112.5T2");
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["flights"][0]["slices"][0]["flight_number"], -7);
    }

    #[test]
    fn test_reject_payload_without_flights() {
        assert!(FlightSet::from_json(br#"{"data": []}"#).is_err());
        assert!(FlightSet::from_json(br#"[1, 2, 3]"#).is_err());
        assert!(FlightSet::from_json(b"<html>502</html>").is_err());
    }

    #[test]
    fn test_number_and_text_flight_numbers_render_alike() {
        let a = Flight::new(vec![Slice::new(101, "T1")]);
        let b = Flight::new(vec![Slice::new("101", "T1")]);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
