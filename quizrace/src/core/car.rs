use serde::Deserialize;

/// Prędkość początkowa każdego samochodu na starcie wyścigu.
const INITIAL_SPEED: f64 = 1.0;

/// Poniżej tego progu resztka boostu jest ścinana z powrotem do 1.0.
const BOOST_SNAP_EPS: f64 = 1e-3;

/// Parametry fizyki jazdy (wspólne dla gracza i botów).
/// * `max_speed` - (px/klatkę) maksymalna prędkość do przodu
/// * `accel` - (px/klatkę²) przyrost prędkości przy wciśniętym gazie
/// * `decel` - (px/klatkę²) hamowanie przy cofaniu
/// * `friction` - (-) mnożnik prędkości na klatkę przy braku gazu
/// * `turn_rate` - (rad/klatkę) przyrost kąta przy skręcie
/// * `collision_damping` - (-) mnożnik prędkości po kontakcie z bandą
/// * `hit_radius` - (px) promień zaliczenia checkpointu
/// * `boost_dwell_ms` - (ms) czas utrzymania pełnego boostu po zebraniu
/// * `boost_decay_rate` - (-) mnożnik zaniku boostu na klatkę po upływie dwell
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhysicsPars {
    pub max_speed: f64,
    pub accel: f64,
    pub decel: f64,
    pub friction: f64,
    pub turn_rate: f64,
    pub collision_damping: f64,
    pub hit_radius: f64,
    pub boost_dwell_ms: f64,
    pub boost_decay_rate: f64,
}

impl Default for PhysicsPars {
    fn default() -> PhysicsPars {
        PhysicsPars {
            max_speed: 15.0,
            accel: 0.5,
            decel: 0.3,
            friction: 0.90,
            turn_rate: 0.05,
            collision_damping: 0.3,
            hit_radius: 40.0,
            boost_dwell_ms: 3000.0,
            boost_decay_rate: 0.98,
        }
    }
}

/// Stan klawiszy sterowania w bieżącej klatce.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputState {
    pub forward: bool,
    pub reverse: bool,
    pub left: bool,
    pub right: bool,
}

/// Stan kinematyczny pojedynczego samochodu.
/// * `rotation` - (rad) 0 wskazuje +x, -pi/2 to "góra" ekranu (malejące y)
/// * `speed` - (px/klatkę) prędkość bazowa, bez mnożnika boost
#[derive(Debug, Clone, Copy)]
pub struct CarState {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub speed: f64,
}

impl CarState {
    pub fn new(x: f64, y: f64, rotation: f64) -> CarState {
        CarState {
            x,
            y,
            rotation,
            speed: INITIAL_SPEED,
        }
    }

    /// Metoda aplikuje wejście kierowcy na prędkość i kąt. Gaz ma pierwszeństwo przed
    /// cofaniem, skręty w obie strony działają niezależnie.
    pub fn apply_driving(&mut self, input: &InputState, phys_pars: &PhysicsPars, boost_factor: f64) {
        if input.forward {
            self.speed = (self.speed + phys_pars.accel).min(phys_pars.max_speed * boost_factor);
        } else if input.reverse {
            self.speed = (self.speed - phys_pars.decel).max(-phys_pars.max_speed * 0.5);
        } else {
            self.speed *= phys_pars.friction;
        }

        if input.left {
            self.rotation -= phys_pars.turn_rate;
        }
        if input.right {
            self.rotation += phys_pars.turn_rate;
        }
    }

    /// Metoda przesuwa samochód wzdłuż bieżącego kąta o prędkość efektywną.
    pub fn integrate(&mut self, boost_factor: f64) {
        let v_eff = self.speed * boost_factor;
        self.x += self.rotation.cos() * v_eff;
        self.y += self.rotation.sin() * v_eff;
    }
}

/// Chwilowy mnożnik prędkości z checkpointu. Pełna wartość trzymana jest przez dwell,
/// potem wygasa geometrycznie do 1.0.
#[derive(Debug, Clone, Copy)]
pub struct BoostState {
    pub factor: f64,
    applied_at_ms: f64,
}

impl BoostState {
    pub fn new() -> BoostState {
        BoostState {
            factor: 1.0,
            applied_at_ms: 0.0,
        }
    }

    /// Metoda ustawia nowy mnożnik boost. Nowy checkpoint nadpisuje poprzedni boost.
    pub fn apply(&mut self, factor: f64, now_ms: f64) {
        self.factor = factor;
        self.applied_at_ms = now_ms;
    }

    /// Metoda wygasza boost po upływie dwell. Wywoływana raz na klatkę.
    pub fn update(&mut self, now_ms: f64, phys_pars: &PhysicsPars) {
        if self.factor > 1.0 && now_ms >= self.applied_at_ms + phys_pars.boost_dwell_ms {
            self.factor = 1.0 + (self.factor - 1.0) * phys_pars.boost_decay_rate;

            if self.factor - 1.0 < BOOST_SNAP_EPS {
                self.factor = 1.0;
            }
        }
    }
}

impl Default for BoostState {
    fn default() -> BoostState {
        BoostState::new()
    }
}
